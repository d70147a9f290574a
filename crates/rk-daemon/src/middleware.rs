// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request id, access logging, throttling, and CORS.

use crate::error::ApiError;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rk_error::Failure;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Response header carrying the request id.
pub const X_REQUEST_ID: &str = "x-request-id";

// ---------------------------------------------------------------------------
// RequestId middleware
// ---------------------------------------------------------------------------

/// A unique request identifier, available as an Axum extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

/// Tag each request with a fresh [`RequestId`] and echo it as
/// `X-Request-Id`, error envelopes included.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    req.extensions_mut().insert(id);
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }
    resp
}

// ---------------------------------------------------------------------------
// RequestLogger
// ---------------------------------------------------------------------------

/// Access log: one `info!` per request.
pub struct RequestLogger;

impl RequestLogger {
    /// Axum-compatible handler function.
    pub async fn layer(req: Request, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        let resp = next.run(req).await;

        let request_id = resp
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info!(
            http.method = %method,
            http.path = %path,
            http.status = resp.status().as_u16(),
            http.duration_ms = start.elapsed().as_millis() as u64,
            request_id = %request_id,
            "request completed"
        );

        resp
    }
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// In-memory sliding-window rate limiter with one window per client.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    /// Allow each client `max_requests` within `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Record a request from `client`. A rejected request is not recorded;
    /// the error carries the time until the oldest hit leaves the window.
    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let window = self.window;
        let mut windows = self.windows.lock().await;
        windows.retain(|key, hits| {
            key == client || hits.back().is_some_and(|&t| now.duration_since(t) <= window)
        });

        let hits = windows.entry(client.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|&t| now.duration_since(t) > window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests as usize {
            let waited = hits.front().map_or(Duration::ZERO, |&t| now.duration_since(t));
            return Err(window.saturating_sub(waited));
        }
        hits.push_back(now);
        Ok(())
    }

    /// Create a Tower [`Layer`](tower::Layer) from this rate limiter.
    pub fn into_layer(self) -> RateLimiterLayer {
        RateLimiterLayer(self)
    }
}

/// Throttling key: the bearer credential, else the first `X-Forwarded-For`
/// hop, else one shared anonymous bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    let value = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    if let Some(token) = value(header::AUTHORIZATION) {
        return format!("auth:{token}");
    }
    if let Some(hop) = value(HeaderName::from_static("x-forwarded-for"))
        .and_then(|v| v.split(',').next().map(|h| h.trim().to_string()))
    {
        return format!("ip:{hop}");
    }
    "anonymous".to_string()
}

/// Whole seconds for `Retry-After`; never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Tower [`Layer`](tower::Layer) applying a [`RateLimiter`].
#[derive(Clone)]
pub struct RateLimiterLayer(RateLimiter);

impl<S: Clone> tower::Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterService {
            limiter: self.0.clone(),
            inner,
        }
    }
}

/// Tower [`Service`](tower::Service) that answers throttled requests with a
/// rate-limit failure instead of forwarding them.
#[derive(Clone)]
pub struct RateLimiterService<S> {
    limiter: RateLimiter,
    inner: S,
}

impl<S> tower::Service<Request<Body>> for RateLimiterService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let client = client_key(req.headers());
        let mut inner = self.inner.clone();
        Box::pin(async move {
            match limiter.check(&client).await {
                Ok(()) => inner.call(req).await,
                Err(wait) => {
                    let failure = Failure::too_many_requests(Some(retry_after_secs(wait)));
                    Ok(ApiError::from(failure).into_response())
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// CORS for browser clients on `origins`. A `*` entry allows any origin.
pub fn cors_layer(origins: &[String], version_header: &HeaderName) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
            version_header.clone(),
        ])
}
