// SPDX-License-Identifier: MIT OR Apache-2.0
//! Failure dispatch, force-JSON, and route-group middleware.

use crate::AppState;
use crate::error::{ApiError, StashedFailure, add_failure_headers};
use crate::flash;
use crate::respond::envelope_response;
use axum::{
    body::Body,
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rk_dispatch::Dispatch;
use rk_envelope::Envelope;
use rk_error::{Failure, FailureKind};
use rk_policy::RoutingContext;
use std::any::Any;
use std::sync::Arc;
use tracing::error;

/// Route group that marks api routes.
pub const API_GROUP: &str = "api";

/// Header carrying the AJAX signal.
pub const X_REQUESTED_WITH: &str = "x-requested-with";

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Route groups declared on the matched route, outermost first.
///
/// Present in request extensions inside a grouped router and copied to the
/// response extensions on the way out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGroups(pub Vec<String>);

impl RouteGroups {
    /// Whether `group` is declared.
    pub fn contains(&self, group: &str) -> bool {
        self.0.iter().any(|g| g == group)
    }
}

/// Set when [`force_json`] rewrote the request's `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcedJson;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Replace failure responses with error envelopes where the policy says so.
///
/// A failure is either stashed by [`ApiError`] or inferred from a bare error
/// status (an extractor rejection, a handler returning `StatusCode`, the
/// router's 405). Validation failures left to the host get their field
/// errors flashed for the page redirected to.
pub async fn dispatch_failures(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut ctx = RoutingContext::new(original_path(&req));
    ctx.accept = header_string(req.headers(), header::ACCEPT.as_str());
    ctx.requested_with = header_string(req.headers(), X_REQUESTED_WITH);
    ctx.forced_json = req.extensions().get::<ForcedJson>().is_some();
    if let Some(groups) = req.extensions().get::<RouteGroups>() {
        ctx.route_groups = groups.0.clone();
    }

    let resp = next.run(req).await;

    let failure = match resp.extensions().get::<StashedFailure>() {
        Some(stashed) => Arc::clone(&stashed.0),
        None => match failure_for_status(resp.status(), resp.headers()) {
            Some(failure) => Arc::new(failure),
            None => return resp,
        },
    };

    if let Some(groups) = resp.extensions().get::<RouteGroups>() {
        ctx.route_groups = groups.0.clone();
    }
    if resp.extensions().get::<ForcedJson>().is_some() {
        ctx.forced_json = true;
    }

    match state.dispatcher.dispatch(&failure, &ctx) {
        Dispatch::Passthrough => flash_errors(&state, &failure, resp).await,
        Dispatch::Render { envelope, .. } => replace_with_envelope(resp, &envelope, &failure),
    }
}

/// Failure implied by an error status that carries no stashed failure.
pub fn failure_for_status(status: StatusCode, headers: &HeaderMap) -> Option<Failure> {
    let failure = match status {
        StatusCode::METHOD_NOT_ALLOWED => Failure::method_not_allowed(allowed_methods(headers)),
        StatusCode::NOT_FOUND => Failure::route_not_found(),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            Failure::too_many_requests(retry_after)
        }
        s if s.is_client_error() || s.is_server_error() => {
            Failure::http(s.as_u16(), s.canonical_reason().unwrap_or_default())
        }
        _ => return None,
    };
    Some(failure)
}

async fn flash_errors(state: &AppState, failure: &Failure, mut resp: Response) -> Response {
    if let FailureKind::Validation { errors } = &failure.kind {
        if resp.status().is_redirection() && !errors.is_empty() {
            let id = state.flash.put(errors.clone()).await;
            resp.headers_mut()
                .append(header::SET_COOKIE, flash::set_cookie(id));
        }
    }
    resp
}

/// Response for a handler panic: an unclassified failure, stashed so the
/// dispatcher renders it like any other.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");
    error!(panic = %detail, "handler panicked");
    ApiError::from(Failure::unknown(detail)).into_response()
}

fn replace_with_envelope(original: Response, envelope: &Envelope, failure: &Failure) -> Response {
    let (parts, _body) = original.into_parts();
    let mut resp = envelope_response(envelope);
    for (name, value) in parts.headers.iter() {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH || name == header::LOCATION
        {
            continue;
        }
        resp.headers_mut().append(name.clone(), value.clone());
    }
    add_failure_headers(&failure.kind, resp.headers_mut());
    *resp.extensions_mut() = parts.extensions;
    resp
}

/// Path as the client sent it, before any `nest` stripped a prefix.
pub fn original_path(req: &Request) -> String {
    req.extensions()
        .get::<OriginalUri>()
        .map_or_else(|| req.uri().path(), |uri| uri.0.path())
        .to_string()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn allowed_methods(headers: &HeaderMap) -> Vec<String> {
    headers
        .get(header::ALLOW)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Router fallback: every unmatched route is a route-level not-found.
pub async fn route_not_found() -> ApiError {
    Failure::route_not_found().into()
}

// ---------------------------------------------------------------------------
// Force JSON
// ---------------------------------------------------------------------------

/// Rewrite `Accept` to `application/json` on api routes while `force_json`
/// is on. Api routes are those under an api prefix or pattern, or declaring
/// the [`API_GROUP`] route group.
pub async fn force_json(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let decision = state.dispatcher.policy().config();
    let grouped = req
        .extensions()
        .get::<RouteGroups>()
        .is_some_and(|g| g.contains(API_GROUP));
    let forced =
        state.config.force_json() && (grouped || decision.is_api_path(&original_path(&req)));

    if !forced {
        return next.run(req).await;
    }

    req.headers_mut().insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    req.extensions_mut().insert(ForcedJson);
    let mut resp = next.run(req).await;
    resp.extensions_mut().insert(ForcedJson);
    resp
}

// ---------------------------------------------------------------------------
// Route groups
// ---------------------------------------------------------------------------

/// Tag every request through the wrapped router with `group`.
pub fn route_group(group: impl Into<String>) -> RouteGroupLayer {
    RouteGroupLayer {
        group: Arc::from(group.into()),
    }
}

/// Tower [`Layer`](tower::Layer) declaring a route group.
#[derive(Debug, Clone)]
pub struct RouteGroupLayer {
    group: Arc<str>,
}

impl<S> tower::Layer<S> for RouteGroupLayer {
    type Service = RouteGroupService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteGroupService {
            group: Arc::clone(&self.group),
            inner,
        }
    }
}

/// Tower [`Service`](tower::Service) produced by [`RouteGroupLayer`].
#[derive(Debug, Clone)]
pub struct RouteGroupService<S> {
    group: Arc<str>,
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RouteGroupService<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut groups = req
            .extensions()
            .get::<RouteGroups>()
            .cloned()
            .unwrap_or_default();
        if !groups.contains(&self.group) {
            groups.0.push(self.group.to_string());
        }
        req.extensions_mut().insert(groups.clone());

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut resp = inner.call(req).await?;
            if resp.extensions().get::<RouteGroups>().is_none() {
                resp.extensions_mut().insert(groups);
            }
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_methods_are_split() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ALLOW, HeaderValue::from_static("GET,HEAD, POST"));
        assert_eq!(allowed_methods(&headers), vec!["GET", "HEAD", "POST"]);
        assert!(allowed_methods(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn bare_statuses_map_to_failures() {
        let none = HeaderMap::new();
        assert_eq!(
            failure_for_status(StatusCode::NOT_FOUND, &none).map(|f| f.kind),
            Some(FailureKind::NotFound(rk_error::NotFoundScope::Route))
        );
        let bad = failure_for_status(StatusCode::BAD_REQUEST, &none).unwrap();
        assert_eq!(bad.kind, FailureKind::Http { status: 400 });
        assert_eq!(bad.message, "Bad Request");

        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("9"));
        assert_eq!(
            failure_for_status(StatusCode::TOO_MANY_REQUESTS, &headers).map(|f| f.kind),
            Some(FailureKind::RateLimited {
                retry_after_secs: Some(9)
            })
        );
        assert!(failure_for_status(StatusCode::OK, &none).is_none());
        assert!(failure_for_status(StatusCode::SEE_OTHER, &none).is_none());
    }

    #[test]
    fn panics_become_unknown_failures() {
        let resp = panic_response(Box::new("kaboom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let stashed = resp.extensions().get::<StashedFailure>().unwrap();
        assert_eq!(stashed.0.kind, FailureKind::Unknown);
        assert_eq!(stashed.0.message, "kaboom");

        let resp = panic_response(Box::new(String::from("owned")));
        let stashed = resp.extensions().get::<StashedFailure>().unwrap();
        assert_eq!(stashed.0.message, "owned");
    }

    #[test]
    fn route_groups_contains() {
        let groups = RouteGroups(vec!["web".into(), "api".into()]);
        assert!(groups.contains("api"));
        assert!(!groups.contains("admin"));
    }
}
