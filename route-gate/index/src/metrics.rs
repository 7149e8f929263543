use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::{
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use route_gate_core::RouteSnapshot;

#[derive(Clone, Debug, Default)]
pub struct IndexMetrics {
    hits: Counter,
    refreshes: Counter,
    refresh_errors: Counter,
    kind_absent: Counter,
    routes: Gauge,
    allowed: Gauge,
}

#[derive(Clone, Debug, Default)]
pub struct ProbeMetrics {
    requests: Family<ProbeLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ProbeLabels {
    result: &'static str,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let hits = Counter::default();
        reg.register(
            "hits",
            "Total number of snapshot reads served from the cache",
            hits.clone(),
        );

        let refreshes = Counter::default();
        reg.register(
            "refreshes",
            "Total number of route listings issued to the API server",
            refreshes.clone(),
        );

        let refresh_errors = Counter::default();
        reg.register(
            "refresh_errors",
            "Total number of route listings that failed",
            refresh_errors.clone(),
        );

        let kind_absent = Counter::default();
        reg.register(
            "kind_absent",
            "Total number of route listings that found no HTTPRoute resource kind",
            kind_absent.clone(),
        );

        let routes = Gauge::default();
        reg.register(
            "routes",
            "Number of routes in the current snapshot",
            routes.clone(),
        );

        let allowed = Gauge::default();
        reg.register(
            "allowed_targets",
            "Number of probeable targets in the current snapshot",
            allowed.clone(),
        );

        Self {
            hits,
            refreshes,
            refresh_errors,
            kind_absent,
            routes,
            allowed,
        }
    }

    pub(crate) fn hit(&self) {
        self.hits.inc();
    }

    pub(crate) fn refresh(&self) {
        self.refreshes.inc();
    }

    pub(crate) fn refresh_error(&self) {
        self.refresh_errors.inc();
    }

    pub(crate) fn kind_absent(&self) {
        self.kind_absent.inc();
    }

    pub(crate) fn set_sizes(&self, snapshot: &RouteSnapshot) {
        self.routes.set(snapshot.routes.len() as i64);
        self.allowed.set(snapshot.allowed.len() as i64);
    }

    #[cfg(test)]
    pub(crate) fn refreshes(&self) -> u64 {
        self.refreshes.get()
    }

    #[cfg(test)]
    pub(crate) fn hits(&self) -> u64 {
        self.hits.get()
    }
}

// === impl ProbeMetrics ===

impl ProbeMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let requests = Family::<ProbeLabels, Counter>::default();
        reg.register(
            "requests",
            "Total number of probe requests by result",
            requests.clone(),
        );
        Self { requests }
    }

    pub(crate) fn invalid(&self) {
        self.inc("invalid");
    }

    pub(crate) fn rejected(&self) {
        self.inc("rejected");
    }

    pub(crate) fn reachable(&self) {
        self.inc("reachable");
    }

    pub(crate) fn unreachable(&self) {
        self.inc("unreachable");
    }

    #[cfg(test)]
    pub(crate) fn get(&self, result: &'static str) -> u64 {
        self.requests.get_or_create(&ProbeLabels { result }).get()
    }

    fn inc(&self, result: &'static str) {
        self.requests.get_or_create(&ProbeLabels { result }).inc();
    }
}
