use crate::{
    core::{ListRoutes, Probe},
    index::{GateError, ProbeGate, ProbeOutcome},
    render,
};
use futures::future;
use hyper::{http, Request, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// The inbound HTTP surface: the route listing page and the gated status
/// check.
pub struct Api<L, P> {
    gate: ProbeGate<L, P>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Reachable<'a> {
    status_code: u16,
    target: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Unreachable<'a> {
    status_code: u16,
    error: &'a str,
    target: &'a str,
}

#[derive(Serialize)]
struct Detail {
    detail: String,
}

// === impl Api ===

impl<L, P> Clone for Api<L, P> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<L, P> Api<L, P> {
    pub fn new(gate: ProbeGate<L, P>) -> Self {
        Self { gate }
    }
}

impl<L, P, B> tower::Service<Request<B>> for Api<L, P>
where
    L: ListRoutes + 'static,
    P: Probe + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        if req.method() != http::Method::GET {
            return Box::pin(future::ok(empty_response(
                http::StatusCode::METHOD_NOT_ALLOWED,
            )));
        }

        let gate = self.gate.clone();
        match req.uri().path() {
            "/" => {
                let host = host(&req);
                Box::pin(async move { list_routes(gate, host).await })
            }
            "/api/check-status" => {
                let target = query_target(req.uri().query());
                Box::pin(async move { check_status(gate, target).await })
            }
            _ => Box::pin(future::ok(empty_response(http::StatusCode::NOT_FOUND))),
        }
    }
}

async fn list_routes<L, P>(
    gate: ProbeGate<L, P>,
    host: Option<String>,
) -> Result<Response<Body>, Error>
where
    L: ListRoutes + 'static,
    P: Probe,
{
    let snapshot = match gate.index().snapshot().await {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(%error, "Failed to load routes");
            return detail_response(http::StatusCode::INTERNAL_SERVER_ERROR, error);
        }
    };
    let html = render::index(host.as_deref(), &snapshot);
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(html))
        .expect("listing response must be valid"))
}

async fn check_status<L, P>(
    gate: ProbeGate<L, P>,
    target: Option<String>,
) -> Result<Response<Body>, Error>
where
    L: ListRoutes + 'static,
    P: Probe,
{
    let Some(target) = target else {
        return detail_response(
            http::StatusCode::BAD_REQUEST,
            "missing 'target' query parameter",
        );
    };

    match gate.check_status(&target).await {
        Ok(ProbeOutcome::Reachable { target, status }) => json_response(
            http::StatusCode::OK,
            &Reachable {
                status_code: status.as_u16(),
                target: &target,
            },
        ),
        Ok(ProbeOutcome::Unreachable { target, error }) => json_response(
            http::StatusCode::SERVICE_UNAVAILABLE,
            &Unreachable {
                status_code: http::StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                error: &error,
                target: &target,
            },
        ),
        Err(GateError::Rejected(rejection)) => {
            detail_response(http::StatusCode::BAD_REQUEST, rejection)
        }
        Err(GateError::Snapshot(error)) => {
            warn!(%error, "Failed to load routes");
            detail_response(http::StatusCode::INTERNAL_SERVER_ERROR, error)
        }
    }
}

/// Reads the probe target from the query string, accepting the legacy `url`
/// key when `target` is absent.
fn query_target(query: Option<&str>) -> Option<String> {
    let mut legacy = None;
    for (key, value) in url::form_urlencoded::parse(query?.as_bytes()) {
        match key.as_ref() {
            "target" => return Some(value.into_owned()),
            "url" if legacy.is_none() => legacy = Some(value.into_owned()),
            _ => {}
        }
    }
    if legacy.is_some() {
        debug!("Using legacy 'url' query parameter");
    }
    legacy
}

fn host<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
}

fn detail_response(
    status: http::StatusCode,
    detail: impl std::fmt::Display,
) -> Result<Response<Body>, Error> {
    json_response(
        status,
        &Detail {
            detail: detail.to_string(),
        },
    )
}

fn json_response<T: Serialize>(
    status: http::StatusCode,
    body: &T,
) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}

fn empty_response(status: http::StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("empty response must be valid")
}
