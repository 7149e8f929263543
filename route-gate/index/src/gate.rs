use crate::{metrics::ProbeMetrics, Index, SnapshotError};
use route_gate_core::{admit, ListRoutes, Probe, Rejection, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{self, Duration};
use tracing::{debug, info};


/// Dials a target only after it has been admitted against the current
/// snapshot.
pub struct ProbeGate<L, P> {
    index: Index<L>,
    probe: Arc<P>,
    timeout: Duration,
    metrics: ProbeMetrics,
}

/// The result of a probe that was allowed to run, reported against the
/// target as the caller spelled it.
///
/// An unreachable target is an expected outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable { target: String, status: StatusCode },
    Unreachable { target: String, error: String },
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

// === impl ProbeGate ===

impl<L, P> Clone for ProbeGate<L, P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            probe: self.probe.clone(),
            timeout: self.timeout,
            metrics: self.metrics.clone(),
        }
    }
}

impl<L, P> ProbeGate<L, P>
where
    L: ListRoutes + 'static,
    P: Probe,
{
    pub fn new(index: Index<L>, probe: P, timeout: Duration, metrics: ProbeMetrics) -> Self {
        Self {
            index,
            probe: Arc::new(probe),
            timeout,
            metrics,
        }
    }

    pub fn index(&self) -> &Index<L> {
        &self.index
    }

    /// Probes `target` with a single GET if the current snapshot allows it.
    ///
    /// No network call is made unless the target is admitted. Dropping the
    /// returned future cancels an in-flight probe.
    pub async fn check_status(&self, target: &str) -> Result<ProbeOutcome, GateError> {
        let snapshot = self.index.snapshot().await?;
        let admitted = match admit(&snapshot, target) {
            Ok(admitted) => admitted,
            Err(rejection) => {
                info!(%rejection, "Rejected probe target");
                match rejection {
                    Rejection::InvalidTarget { .. } => self.metrics.invalid(),
                    Rejection::NotAllowed { .. } => self.metrics.rejected(),
                }
                return Err(rejection.into());
            }
        };
        drop(snapshot);

        let url = admitted.url;
        let error = match time::timeout(self.timeout, self.probe.get(&url)).await {
            Ok(Ok(status)) => {
                debug!(%url, %status, "Probe completed");
                self.metrics.reachable();
                return Ok(ProbeOutcome::Reachable {
                    target: target.to_string(),
                    status,
                });
            }
            Ok(Err(error)) => error.to_string(),
            Err(_) => format!("probe timed out after {:?}", self.timeout),
        };
        debug!(%url, %error, "Probe failed");
        self.metrics.unreachable();
        Ok(ProbeOutcome::Unreachable {
            target: target.to_string(),
            error,
        })
    }
}
