#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod gate;
mod mode;
pub mod normalize;
pub mod route;

pub use self::{
    gate::{admit, Admitted, Rejection},
    mode::DerivationMode,
    normalize::normalize,
    route::{AllowList, BackendTarget, RouteRecord, RouteRule, RouteSnapshot},
};
pub use http::StatusCode;

/// The Gateway API resource that routes are read from.
pub const ROUTE_GROUP: &str = "gateway.networking.k8s.io";
pub const ROUTE_VERSION: &str = "v1";
pub const ROUTE_PLURAL: &str = "httproutes";

/// Lists raw routing resources from the control plane.
///
/// Items are returned as the API server serialized them so that malformed
/// fields can be skipped individually rather than failing the whole list.
#[async_trait::async_trait]
pub trait ListRoutes: Send + Sync {
    async fn list_routes(&self) -> Result<Vec<serde_json::Value>, ListError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The route CRD is not installed in the cluster.
    #[error("{ROUTE_PLURAL}.{ROUTE_GROUP} resource kind not found")]
    KindNotFound,

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Issues a single outbound GET for an admitted target.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn get(&self, url: &str) -> Result<StatusCode, ProbeError>;
}

/// A transport-level probe failure: connection refused, timeout, DNS or TLS
/// errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(pub String);
