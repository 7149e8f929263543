use crate::core::{DerivationMode, RouteRecord, RouteSnapshot};
use std::fmt::Write;

/// Renders the route listing page. Every route-supplied string is escaped.
///
/// A check link is only rendered for a target the gate would admit, so the
/// page never offers a probe that is certain to be rejected.
pub(crate) fn index(host: Option<&str>, snapshot: &RouteSnapshot) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>HTTPRoutes</title></head>\n<body>\n",
    );
    let _ = writeln!(
        html,
        "<h1>HTTPRoutes{}</h1>",
        host.map(|h| format!(" on {}", escape(h))).unwrap_or_default()
    );
    let _ = writeln!(
        html,
        "<p>{} routes, {} probeable targets ({} mode), listed at {}</p>",
        snapshot.routes.len(),
        snapshot.allowed.len(),
        snapshot.mode,
        snapshot.fetched_at.to_rfc3339(),
    );

    if snapshot.routes.is_empty() {
        html.push_str("<p>No HTTPRoutes found.</p>\n");
    } else {
        html.push_str(
            "<table>\n<tr><th>Name</th><th>Namespace</th><th>Hostnames</th><th>Backends</th></tr>\n",
        );
        for route in &snapshot.routes {
            route_row(&mut html, snapshot, route);
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn route_row(html: &mut String, snapshot: &RouteSnapshot, route: &RouteRecord) {
    let _ = write!(
        html,
        "<tr><td>{}</td><td>{}</td><td>",
        escape(&route.name),
        escape(&route.namespace)
    );
    for host in &route.hostnames {
        let _ = write!(html, "<div>{}", escape(host));
        if snapshot.mode == DerivationMode::Hostname && snapshot.allowed.contains(host) {
            check_link(html, &format!("http://{host}/"));
        }
        html.push_str("</div>");
    }
    html.push_str("</td><td>");
    for backend in route.backends() {
        let _ = write!(
            html,
            "<div>{}.{}:{}",
            escape(&backend.name),
            escape(&backend.namespace),
            backend.port
        );
        if let Some(address) = backend.address.as_deref() {
            let _ = write!(html, " <code>{}</code>", escape(address));
            if snapshot.allowed.contains(address) {
                check_link(html, address);
            }
        }
        html.push_str("</div>");
    }
    html.push_str("</td></tr>\n");
}

fn check_link(html: &mut String, target: &str) {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("target", target)
        .finish();
    let _ = write!(
        html,
        " <a href=\"/api/check-status?{}\">check</a>",
        escape(&query)
    );
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
