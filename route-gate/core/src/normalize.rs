use crate::{AllowList, BackendTarget, DerivationMode, RouteRecord, RouteRule, RouteSnapshot};
use chrono::offset::Utc;
use serde_json::Value;
use std::num::NonZeroU16;
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Builds a snapshot from raw route objects.
///
/// Normalization never fails. Routes without a name or namespace are dropped,
/// and backend references without a DNS-label name and namespace or a valid
/// port are skipped without discarding the rest of their route. Absent
/// `rules`, `backendRefs` and `hostnames` lists are treated as empty.
/// Wildcard hostnames are listed but never allowed.
pub fn normalize(mode: DerivationMode, items: Vec<Value>) -> RouteSnapshot {
    let mut allowed = AllowList::default();
    let mut routes = items
        .into_iter()
        .filter_map(|raw| route(mode, raw, &mut allowed))
        .collect::<Vec<_>>();
    routes.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });

    RouteSnapshot {
        routes,
        allowed,
        mode,
        fetched_at: Utc::now(),
    }
}

fn route(mode: DerivationMode, mut raw: Value, allowed: &mut AllowList) -> Option<RouteRecord> {
    let name = non_empty_str(raw.pointer("/metadata/name")).map(str::to_string);
    let namespace = non_empty_str(raw.pointer("/metadata/namespace")).map(str::to_string);
    let (name, namespace) = match (name, namespace) {
        (Some(name), Some(namespace)) => (name, namespace),
        (name, namespace) => {
            warn!(?name, ?namespace, "Ignoring route without a name and namespace");
            return None;
        }
    };

    let hostnames = raw
        .pointer("/spec/hostnames")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|h| non_empty_str(Some(h)))
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();

    let mut rules = Vec::new();
    let raw_rules = raw
        .pointer_mut("/spec/rules")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten();
    for raw_rule in raw_rules {
        let mut backends = Vec::new();
        let refs = raw_rule
            .get_mut("backendRefs")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten();
        for backend_ref in refs {
            match backend(mode, &namespace, backend_ref) {
                Some(backend) => backends.push(backend),
                None => warn!(
                    %namespace,
                    route = %name,
                    "Skipping backend reference without a valid name, namespace and port"
                ),
            }
        }
        rules.push(RouteRule {
            namespace: namespace.clone(),
            backends,
        });
    }

    match mode {
        DerivationMode::Address => {
            for address in rules
                .iter()
                .flat_map(|rule| rule.backends.iter())
                .filter_map(|backend| backend.address.clone())
            {
                allowed.insert(address);
            }
        }
        DerivationMode::Hostname => {
            // Wildcard hostnames match many hosts and cannot be dialed.
            for hostname in hostnames.iter().filter(|h| !h.starts_with('*')) {
                allowed.insert(hostname.clone());
            }
        }
    }

    debug!(%namespace, %name, rules = rules.len(), "Normalized route");
    Some(RouteRecord {
        name,
        namespace,
        hostnames,
        rules,
        raw,
    })
}

fn backend(
    mode: DerivationMode,
    route_namespace: &str,
    backend_ref: &mut Value,
) -> Option<BackendTarget> {
    let name = non_empty_str(backend_ref.get("name"))
        .filter(|name| is_dns_label(name))?
        .to_string();
    let port = backend_ref
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|port| u16::try_from(port).ok())
        .and_then(NonZeroU16::new)?;
    let namespace = non_empty_str(backend_ref.get("namespace"))
        .unwrap_or(route_namespace);
    if !is_dns_label(namespace) {
        return None;
    }
    let namespace = namespace.to_string();

    let address = match mode {
        DerivationMode::Address => {
            let address = BackendTarget::compose_address(&name, &namespace, port);
            if let Some(obj) = backend_ref.as_object_mut() {
                obj.insert("internalUrl".to_string(), Value::String(address.clone()));
            }
            Some(address)
        }
        DerivationMode::Hostname => None,
    };

    Some(BackendTarget {
        name,
        namespace,
        port,
        address,
    })
}

/// An RFC 1123 label, as Kubernetes requires of service and namespace names.
fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
