use parking_lot::Mutex;
use route_gate_core::{ListError, ListRoutes, Probe, ProbeError, StatusCode};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::time::{self, Duration};

#[derive(Clone)]
pub enum Listing {
    Routes(Vec<Value>),
    KindNotFound,
    Fail(&'static str),
}

/// A route lister that counts calls and answers with a configurable listing
/// after an optional delay.
#[derive(Clone)]
pub struct MockRoutes {
    listing: Arc<Mutex<Listing>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct MockProbe {
    result: Result<StatusCode, ProbeError>,
    delay: Duration,
    urls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
}

/// Counts a request as in flight until dropped.
struct InFlight(Arc<AtomicUsize>);

pub fn orders_route(port: u16) -> Value {
    json!({
        "metadata": { "namespace": "shop", "name": "orders" },
        "spec": {
            "hostnames": ["orders.example.com"],
            "rules": [{ "backendRefs": [{ "name": "orders-svc", "port": port }] }],
        },
    })
}

// === impl MockRoutes ===

impl MockRoutes {
    pub fn new(listing: Listing) -> Self {
        Self {
            listing: Arc::new(Mutex::new(listing)),
            delay: Duration::ZERO,
            calls: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, listing: Listing) {
        *self.listing.lock() = listing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ListRoutes for MockRoutes {
    async fn list_routes(&self) -> Result<Vec<Value>, ListError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            time::sleep(self.delay).await;
        }
        let listing = self.listing.lock().clone();
        match listing {
            Listing::Routes(items) => Ok(items),
            Listing::KindNotFound => Err(ListError::KindNotFound),
            Listing::Fail(msg) => Err(ListError::Unavailable(anyhow::anyhow!(msg))),
        }
    }
}

// === impl MockProbe ===

impl MockProbe {
    pub fn new(result: Result<StatusCode, ProbeError>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            urls: Default::default(),
            in_flight: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A handle on the URLs this probe has dialed.
    pub fn urls(&self) -> Arc<Mutex<Vec<String>>> {
        self.urls.clone()
    }

    /// A handle on the number of requests that are started and not yet
    /// completed or dropped.
    pub fn in_flight(&self) -> Arc<AtomicUsize> {
        self.in_flight.clone()
    }
}

#[async_trait::async_trait]
impl Probe for MockProbe {
    async fn get(&self, url: &str) -> Result<StatusCode, ProbeError> {
        self.urls.lock().push(url.to_string());
        let _in_flight = InFlight::enter(&self.in_flight);
        if !self.delay.is_zero() {
            time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

// === impl InFlight ===

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
