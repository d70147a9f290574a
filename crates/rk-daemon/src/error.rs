// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handler error type and the host's default failure rendering.
//!
//! Handlers return `Result<_, ApiError>`. Converting an [`ApiError`] into a
//! response produces what a plain web app would send (an HTML error page or
//! a redirect) and stashes the [`Failure`] in the response extensions, where
//! [`dispatch_failures`](crate::dispatch::dispatch_failures) can swap the
//! whole response for a JSON envelope, or flash a validation failure's field
//! errors when it keeps the redirect.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use rk_error::{Failure, FailureKind, classify};
use std::sync::Arc;

/// Where unauthenticated browser requests are sent.
pub const LOGIN_PATH: &str = "/login";

/// A failure travelling through response extensions.
#[derive(Debug, Clone)]
pub struct StashedFailure(pub Arc<Failure>);

/// Error returned by handlers and extractors.
#[derive(Debug)]
pub struct ApiError {
    failure: Failure,
    redirect_back: Option<String>,
}

impl ApiError {
    /// Wrap a failure.
    pub fn new(failure: Failure) -> Self {
        Self {
            failure,
            redirect_back: None,
        }
    }

    /// Page a browser should be sent back to for validation failures.
    pub fn redirect_back(mut self, to: impl Into<String>) -> Self {
        self.redirect_back = Some(to.into());
        self
    }

    /// The wrapped failure.
    pub fn failure(&self) -> &Failure {
        &self.failure
    }
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        Self::new(failure)
    }
}

impl From<anyhow::Error> for ApiError {
    #[track_caller]
    fn from(err: anyhow::Error) -> Self {
        Self::new(Failure::from(err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.failure, f)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut resp = default_response(&self.failure, self.redirect_back.as_deref());
        resp.extensions_mut()
            .insert(StashedFailure(Arc::new(self.failure)));
        resp
    }
}

/// Non-JSON rendering of a failure: validation failures go back to the form,
/// unauthenticated callers to the login page, everything else gets a short
/// HTML error page.
pub fn default_response(failure: &Failure, back: Option<&str>) -> Response {
    let c = classify(failure);
    let mut resp = match &failure.kind {
        FailureKind::Validation { .. } => Redirect::to(back.unwrap_or("/")).into_response(),
        FailureKind::Authentication => Redirect::to(LOGIN_PATH).into_response(),
        _ => {
            let status =
                StatusCode::from_u16(c.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Html(error_page(status, &c.message))).into_response()
        }
    };
    add_failure_headers(&failure.kind, resp.headers_mut());
    resp
}

/// `Retry-After` for throttling, `Allow` for wrong methods.
pub fn add_failure_headers(kind: &FailureKind, headers: &mut axum::http::HeaderMap) {
    match kind {
        FailureKind::RateLimited {
            retry_after_secs: Some(secs),
        } => {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*secs));
        }
        FailureKind::MethodNotAllowed { allowed } if !allowed.is_empty() => {
            if let Ok(v) = HeaderValue::from_str(&allowed.join(", ")) {
                headers.insert(header::ALLOW, v);
            }
        }
        _ => {}
    }
}

fn error_page(status: StatusCode, message: &str) -> String {
    let escaped = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<!doctype html><html><head><title>{code}</title></head>\
         <body><h1>{code}</h1><p>{escaped}</p></body></html>",
        code = status.as_u16()
    )
}
