use crate::DerivationMode;
use chrono::{offset::Utc, DateTime};
use std::{collections::BTreeSet, num::NonZeroU16};

/// The normalized state of all routes at a point in time.
///
/// `allowed` is always exactly the set derived from `routes`; snapshots are
/// only ever built by [`crate::normalize`] and are never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSnapshot {
    pub routes: Vec<RouteRecord>,
    pub allowed: AllowList,
    pub mode: DerivationMode,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteRecord {
    pub name: String,
    pub namespace: String,
    pub hostnames: Vec<String>,
    pub rules: Vec<RouteRule>,

    /// The route as it was listed, with derived addresses attached to each
    /// usable backend reference as `internalUrl`.
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
    pub namespace: String,
    pub backends: Vec<BackendTarget>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendTarget {
    pub name: String,
    pub namespace: String,
    pub port: NonZeroU16,

    /// Set only when addresses are derived from backends.
    pub address: Option<String>,
}

/// The set of probeable identities: composed addresses or hostnames,
/// depending on the snapshot's [`DerivationMode`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

// === impl RouteSnapshot ===

impl RouteSnapshot {
    /// A valid snapshot with no routes, used when the route CRD is absent.
    pub fn empty(mode: DerivationMode) -> Self {
        Self {
            routes: Vec::new(),
            allowed: AllowList::default(),
            mode,
            fetched_at: Utc::now(),
        }
    }
}

// === impl RouteRecord ===

impl RouteRecord {
    /// Iterates over every usable backend in rule order.
    pub fn backends(&self) -> impl Iterator<Item = &BackendTarget> {
        self.rules.iter().flat_map(|rule| rule.backends.iter())
    }
}

// === impl BackendTarget ===

impl BackendTarget {
    /// Composes the cluster-local address for a backend.
    pub fn compose_address(name: &str, namespace: &str, port: NonZeroU16) -> String {
        format!("http://{name}.{namespace}:{port}")
    }
}

// === impl AllowList ===

impl AllowList {
    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, identity: String) {
        self.0.insert(identity);
    }
}
