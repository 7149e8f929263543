use super::*;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn mk_route(ns: &str, name: &str, rules: Value) -> Value {
    json!({
        "apiVersion": "gateway.networking.k8s.io/v1",
        "kind": "HTTPRoute",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "rules": rules },
    })
}

fn allowed(snapshot: &RouteSnapshot) -> BTreeSet<String> {
    snapshot.allowed.iter().map(str::to_string).collect()
}

#[test]
fn derives_address_for_backend_in_route_namespace() {
    let snapshot = normalize(
        DerivationMode::Address,
        vec![mk_route(
            "shop",
            "orders",
            json!([{ "backendRefs": [{ "name": "orders-svc", "port": 8080 }] }]),
        )],
    );

    assert_eq!(
        allowed(&snapshot),
        btreeset! { "http://orders-svc.shop:8080".to_string() }
    );
    assert_eq!(snapshot.routes.len(), 1);
    let route = &snapshot.routes[0];
    assert_eq!(route.name, "orders");
    assert_eq!(route.namespace, "shop");
    assert_eq!(
        route.rules,
        vec![RouteRule {
            namespace: "shop".to_string(),
            backends: vec![BackendTarget {
                name: "orders-svc".to_string(),
                namespace: "shop".to_string(),
                port: NonZeroU16::new(8080).unwrap(),
                address: Some("http://orders-svc.shop:8080".to_string()),
            }],
        }]
    );
    assert_eq!(
        route.raw.pointer("/spec/rules/0/backendRefs/0/internalUrl"),
        Some(&json!("http://orders-svc.shop:8080")),
        "the displayed backend must carry the same address that is allowed"
    );
}

#[test]
fn backend_namespace_overrides_route_namespace() {
    let snapshot = normalize(
        DerivationMode::Address,
        vec![mk_route(
            "shop",
            "orders",
            json!([{ "backendRefs": [
                { "name": "orders-svc", "port": 8080, "namespace": "billing" },
            ] }]),
        )],
    );
    assert_eq!(
        allowed(&snapshot),
        btreeset! { "http://orders-svc.billing:8080".to_string() }
    );
    assert_eq!(snapshot.routes[0].rules[0].namespace, "shop");
    assert_eq!(snapshot.routes[0].rules[0].backends[0].namespace, "billing");
}

#[test]
fn skips_malformed_backends_without_dropping_route() {
    let snapshot = normalize(
        DerivationMode::Address,
        vec![mk_route(
            "shop",
            "orders",
            json!([{ "backendRefs": [
                { "name": "no-port" },
                { "port": 80 },
                { "name": "", "port": 80 },
                { "name": "zero-port", "port": 0 },
                { "name": "big-port", "port": 70000 },
                { "name": "string-port", "port": "80" },
                "not-an-object",
                { "name": "good", "port": 80 },
                { "name": "evil.example.com:9999/x", "port": 8080 },
                { "name": "admin@evil", "port": 80 },
                { "name": "Upper", "port": 80 },
                { "name": "-leading", "port": 80 },
                { "name": "trailing-", "port": 80 },
                { "name": "a".repeat(64), "port": 80 },
                { "name": "svc", "namespace": "evil.example.com:9999", "port": 80 },
            ] }]),
        )],
    );

    assert_eq!(
        allowed(&snapshot),
        btreeset! { "http://good.shop:80".to_string() }
    );
    let route = &snapshot.routes[0];
    assert_eq!(route.backends().count(), 1);
    assert_eq!(
        route.raw.pointer("/spec/rules/0/backendRefs/0/internalUrl"),
        None,
        "skipped backends must not be annotated"
    );
    assert_eq!(
        route.raw.pointer("/spec/rules/0/backendRefs/7/internalUrl"),
        Some(&json!("http://good.shop:80"))
    );
    assert_eq!(
        route.raw.pointer("/spec/rules/0/backendRefs/8/internalUrl"),
        None,
        "names that are not DNS labels must not compose an address"
    );
}

#[test]
fn drops_routes_without_identity() {
    let nameless = json!({
        "metadata": { "namespace": "shop" },
        "spec": { "rules": [{ "backendRefs": [{ "name": "svc", "port": 80 }] }] },
    });
    let namespaceless = json!({
        "metadata": { "name": "orders" },
        "spec": { "rules": [{ "backendRefs": [{ "name": "svc", "port": 80 }] }] },
    });
    let snapshot = normalize(
        DerivationMode::Address,
        vec![nameless, namespaceless, json!("garbage"), json!({})],
    );
    assert!(snapshot.routes.is_empty());
    assert!(snapshot.allowed.is_empty());
}

#[test]
fn absent_lists_are_empty() {
    let no_spec = json!({ "metadata": { "namespace": "ns", "name": "a" } });
    let no_rules = json!({ "metadata": { "namespace": "ns", "name": "b" }, "spec": {} });
    let no_refs = mk_route("ns", "c", json!([{ "matches": [] }]));
    let null_rules = mk_route("ns", "d", Value::Null);

    for mode in [DerivationMode::Address, DerivationMode::Hostname] {
        let snapshot = normalize(
            mode,
            vec![
                no_spec.clone(),
                no_rules.clone(),
                no_refs.clone(),
                null_rules.clone(),
            ],
        );
        let names = snapshot
            .routes
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(snapshot.allowed.is_empty());
        assert_eq!(snapshot.routes[2].rules.len(), 1);
        assert!(snapshot.routes[2].rules[0].backends.is_empty());
    }
}

#[test]
fn routes_are_sorted_by_name() {
    let snapshot = normalize(
        DerivationMode::Address,
        vec![
            mk_route("ns-1", "web", json!([])),
            mk_route("ns-0", "api", json!([])),
            mk_route("ns-0", "web", json!([])),
        ],
    );
    let ids = snapshot
        .routes
        .iter()
        .map(|r| (r.name.as_str(), r.namespace.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![("api", "ns-0"), ("web", "ns-0"), ("web", "ns-1")]);
}

#[test]
fn hostname_mode_allows_declared_hostnames() {
    let route = json!({
        "metadata": { "namespace": "shop", "name": "orders" },
        "spec": {
            "hostnames": ["Orders.Example.com", "shop.example.com", ""],
            "rules": [{ "backendRefs": [{ "name": "orders-svc", "port": 8080 }] }],
        },
    });
    let snapshot = normalize(DerivationMode::Hostname, vec![route]);

    assert_eq!(
        allowed(&snapshot),
        btreeset! {
            "orders.example.com".to_string(),
            "shop.example.com".to_string(),
        }
    );
    let route = &snapshot.routes[0];
    assert_eq!(route.hostnames, vec!["orders.example.com", "shop.example.com"]);
    assert_eq!(route.rules[0].backends[0].address, None);
    assert_eq!(
        route.raw.pointer("/spec/rules/0/backendRefs/0/internalUrl"),
        None,
        "backend addresses are not probeable in hostname mode"
    );
}

#[test]
fn wildcard_hostnames_are_listed_but_not_allowed() {
    let route = json!({
        "metadata": { "namespace": "shop", "name": "orders" },
        "spec": { "hostnames": ["*.example.com", "orders.example.com"] },
    });
    let snapshot = normalize(DerivationMode::Hostname, vec![route]);

    assert_eq!(allowed(&snapshot), btreeset! { "orders.example.com".to_string() });
    assert_eq!(
        snapshot.routes[0].hostnames,
        vec!["*.example.com", "orders.example.com"]
    );
}

#[test]
fn address_mode_ignores_hostnames() {
    let route = json!({
        "metadata": { "namespace": "shop", "name": "orders" },
        "spec": { "hostnames": ["orders.example.com"] },
    });
    let snapshot = normalize(DerivationMode::Address, vec![route]);
    assert!(snapshot.allowed.is_empty());
    assert_eq!(snapshot.routes[0].hostnames, vec!["orders.example.com"]);
}

#[test]
fn normalization_is_idempotent() {
    let items = vec![
        mk_route(
            "shop",
            "orders",
            json!([{ "backendRefs": [{ "name": "orders-svc", "port": 8080 }] }]),
        ),
        mk_route(
            "shop",
            "carts",
            json!([{ "backendRefs": [{ "name": "carts-svc", "port": 80, "namespace": "x" }] }]),
        ),
    ];
    let a = normalize(DerivationMode::Address, items.clone());
    let b = normalize(DerivationMode::Address, items);
    assert_eq!(a.routes, b.routes);
    assert_eq!(a.allowed, b.allowed);
}

/// Names that embed an authority, port, path or other non-label text.
fn injected_name() -> impl Strategy<Value = String> {
    "[a-z]{1,5}(\\.[a-z]{1,5}|:[0-9]{1,4}|/[a-z]{0,3}|@[a-z]{1,3}|[A-Z_ ]|\\?x=1)[a-z]{0,3}"
}

/// Mirrors the RFC 1123 label rule.
fn is_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
}

prop_compose! {
    fn backend_ref()(
        name in proptest::option::of(prop_oneof![
            3 => "[a-z][a-z0-9-]{0,8}",
            1 => injected_name(),
        ]),
        port in proptest::option::of(0u64..70_000),
        namespace in proptest::option::of(prop_oneof![
            4 => "[a-z]{1,5}",
            1 => injected_name(),
        ]),
    ) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(name) = name {
            obj.insert("name".into(), json!(name));
        }
        if let Some(port) = port {
            obj.insert("port".into(), json!(port));
        }
        if let Some(namespace) = namespace {
            obj.insert("namespace".into(), json!(namespace));
        }
        Value::Object(obj)
    }
}

prop_compose! {
    fn raw_route()(
        namespace in "[a-z]{1,5}",
        name in "[a-z]{1,5}",
        rules in proptest::collection::vec(proptest::collection::vec(backend_ref(), 0..4), 0..3),
    ) -> Value {
        let rules = rules
            .into_iter()
            .map(|refs| json!({ "backendRefs": refs }))
            .collect::<Vec<_>>();
        mk_route(&namespace, &name, Value::Array(rules))
    }
}

/// Computes the addresses that every well-formed backend in `items` should
/// contribute, independently of the normalizer.
fn expected_addresses(items: &[Value]) -> BTreeSet<String> {
    let mut expected = BTreeSet::new();
    for item in items {
        let route_ns = item["metadata"]["namespace"].as_str().unwrap();
        for rule in item["spec"]["rules"].as_array().unwrap() {
            for backend in rule["backendRefs"].as_array().unwrap() {
                let name = backend.get("name").and_then(Value::as_str);
                let port = backend.get("port").and_then(Value::as_u64);
                if let (Some(name), Some(port)) = (name, port) {
                    let ns = backend
                        .get("namespace")
                        .and_then(Value::as_str)
                        .unwrap_or(route_ns);
                    if (1..=u16::MAX as u64).contains(&port) && is_label(name) && is_label(ns) {
                        expected.insert(format!("http://{name}.{ns}:{port}"));
                    }
                }
            }
        }
    }
    expected
}

proptest! {
    #[test]
    fn allow_list_is_exactly_derived_from_routes(items in proptest::collection::vec(raw_route(), 0..6)) {
        let snapshot = normalize(DerivationMode::Address, items.clone());

        // Every allowed address comes from a displayed backend.
        let displayed = snapshot
            .routes
            .iter()
            .flat_map(|r| r.backends())
            .filter_map(|b| b.address.clone())
            .collect::<BTreeSet<_>>();
        prop_assert_eq!(&allowed(&snapshot), &displayed);

        // Every well-formed backend is represented.
        prop_assert_eq!(allowed(&snapshot), expected_addresses(&items));

        // Every allowed address dials exactly the backend it was derived from.
        for backend in snapshot.routes.iter().flat_map(|r| r.backends()) {
            let address = backend.address.as_deref().unwrap();
            let uri = address.parse::<http::Uri>().unwrap();
            let expected_host = format!("{}.{}", backend.name, backend.namespace);
            prop_assert_eq!(uri.host(), Some(expected_host.as_str()));
            prop_assert_eq!(uri.port_u16(), Some(backend.port.get()));
            prop_assert!(uri.query().is_none());
        }

        // Routes are displayed in name order.
        let names = snapshot.routes.iter().map(|r| r.name.clone()).collect::<Vec<_>>();
        let mut sorted = names.clone();
        sorted.sort();
        prop_assert_eq!(names, sorted);
    }

    #[test]
    fn normalization_is_deterministic(items in proptest::collection::vec(raw_route(), 0..6)) {
        let a = normalize(DerivationMode::Address, items.clone());
        let b = normalize(DerivationMode::Address, items);
        prop_assert_eq!(a.routes, b.routes);
        prop_assert_eq!(a.allowed, b.allowed);
    }
}
