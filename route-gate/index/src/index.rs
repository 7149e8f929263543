use crate::metrics::IndexMetrics;
use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use route_gate_core::{normalize, DerivationMode, ListError, ListRoutes, RouteSnapshot};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};


#[derive(Clone, Debug)]
pub struct Config {
    pub mode: DerivationMode,

    /// How long a snapshot is served before the next read refreshes it.
    pub ttl: Duration,

    /// Bounds each listing call to the API server.
    pub list_timeout: Duration,
}

/// Serves the most recent route snapshot, refreshing it lazily once it
/// expires.
///
/// At most one refresh runs at a time. Readers that find the snapshot stale
/// while a refresh is in flight wait on that refresh instead of starting
/// another. Refreshes run on their own task so that a reader going away never
/// cancels one.
pub struct Index<L> {
    inner: Arc<Inner<L>>,
}

#[derive(Clone, Debug, Error)]
pub enum SnapshotError {
    #[error("failed to list HTTPRoutes: {0:#}")]
    ClusterUnavailable(Arc<anyhow::Error>),
}

struct Inner<L> {
    lister: L,
    config: Config,
    metrics: IndexMetrics,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    entry: Option<CacheEntry>,
    refresh: Option<Refresh>,
}

struct CacheEntry {
    snapshot: Arc<RouteSnapshot>,
    expires_at: Instant,
}

type Refresh = Shared<BoxFuture<'static, Result<Arc<RouteSnapshot>, SnapshotError>>>;

// === impl Index ===

impl<L> Clone for Index<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L> Index<L>
where
    L: ListRoutes + 'static,
{
    pub fn new(lister: L, config: Config, metrics: IndexMetrics) -> Self {
        Self {
            inner: Arc::new(Inner {
                lister,
                config,
                metrics,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns the current snapshot, refreshing it first if it has expired.
    pub async fn snapshot(&self) -> Result<Arc<RouteSnapshot>, SnapshotError> {
        let refresh = {
            let mut state = self.inner.state.lock();
            if let Some(entry) = state.entry.as_ref() {
                if Instant::now() < entry.expires_at {
                    self.inner.metrics.hit();
                    return Ok(entry.snapshot.clone());
                }
            }

            match state.refresh.as_ref() {
                Some(refresh) => {
                    debug!("Waiting on in-flight refresh");
                    refresh.clone()
                }
                None => {
                    let refresh = self.spawn_refresh();
                    state.refresh = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn spawn_refresh(&self) -> Refresh {
        let inner = self.inner.clone();
        let task = tokio::spawn(
            async move { inner.refresh().await }.instrument(info_span!("refresh")),
        );
        async move {
            task.await.unwrap_or_else(|error| {
                Err(SnapshotError::ClusterUnavailable(Arc::new(anyhow!(
                    "refresh task failed: {error}"
                ))))
            })
        }
        .boxed()
        .shared()
    }
}

// === impl Inner ===

impl<L: ListRoutes> Inner<L> {
    async fn refresh(&self) -> Result<Arc<RouteSnapshot>, SnapshotError> {
        debug!("Listing HTTPRoutes");
        self.metrics.refresh();
        let mode = self.config.mode;
        let listed = time::timeout(self.config.list_timeout, self.lister.list_routes()).await;
        let result = match listed {
            Ok(Ok(items)) => Ok(normalize(mode, items)),
            Ok(Err(ListError::KindNotFound)) => {
                warn!("httproutes.gateway.networking.k8s.io resource kind not found, serving no routes");
                self.metrics.kind_absent();
                Ok(RouteSnapshot::empty(mode))
            }
            Ok(Err(ListError::Unavailable(error))) => {
                Err(SnapshotError::ClusterUnavailable(Arc::new(error)))
            }
            Err(_) => Err(SnapshotError::ClusterUnavailable(Arc::new(anyhow!(
                "timed out after {:?}",
                self.config.list_timeout
            )))),
        };

        let mut state = self.state.lock();
        state.refresh = None;
        match result {
            Ok(snapshot) => {
                info!(
                    routes = snapshot.routes.len(),
                    allowed = snapshot.allowed.len(),
                    "Refreshed routes"
                );
                self.metrics.set_sizes(&snapshot);
                let snapshot = Arc::new(snapshot);
                state.entry = Some(CacheEntry {
                    snapshot: snapshot.clone(),
                    expires_at: Instant::now() + self.config.ttl,
                });
                Ok(snapshot)
            }
            Err(error) => {
                warn!(%error, "Failed to refresh routes");
                self.metrics.refresh_error();
                state.entry = None;
                Err(error)
            }
        }
    }
}
