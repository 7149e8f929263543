#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_api::apis::standard::httproutes::HTTPRoute;
pub use kube::{Client, Error};

use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use route_gate_core::{ListError, ListRoutes};
use serde_json::Value;
use tracing::{debug, warn};

/// Lists Gateway API HTTPRoutes in all namespaces.
///
/// Routes are listed as dynamic objects so that a malformed spec on one route
/// cannot fail the whole list.
#[derive(Clone)]
pub struct ClusterRoutes {
    api: Api<DynamicObject>,
}

// === impl ClusterRoutes ===

impl ClusterRoutes {
    pub fn new(client: Client) -> Self {
        let resource = ApiResource::erase::<HTTPRoute>(&());
        Self {
            api: Api::all_with(client, &resource),
        }
    }
}

#[async_trait::async_trait]
impl ListRoutes for ClusterRoutes {
    async fn list_routes(&self) -> Result<Vec<Value>, ListError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(list_error)?;
        debug!(items = list.items.len(), "Listed HTTPRoutes");

        let items = list
            .items
            .into_iter()
            .filter_map(|obj| match serde_json::to_value(&obj) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(%error, name = ?obj.metadata.name, "Failed to encode HTTPRoute");
                    None
                }
            })
            .collect();
        Ok(items)
    }
}

/// A 404 on a cluster-wide list means the resource kind is not served.
fn list_error(error: Error) -> ListError {
    match error {
        Error::Api(rsp) if rsp.code == 404 => ListError::KindNotFound,
        error => ListError::Unavailable(error.into()),
    }
}
