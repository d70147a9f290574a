// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod api;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod flash;
pub mod middleware;
pub mod pagination;
pub mod respond;
pub mod versioning;

use anyhow::Context;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use dispatch::{API_GROUP, route_group};
use middleware::{RateLimiter, RequestLogger, cors_layer, request_id_middleware};
use rk_config::RestKitConfig;
use rk_dispatch::ExceptionDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;

pub use error::ApiError;
pub use respond::Responder;

/// Mount point of the api router.
pub const API_BASE: &str = "/api/v1";

/// Route group declared by the web routes.
pub const WEB_GROUP: &str = "web";

/// Shared application state.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<RestKitConfig>,
    /// Failure → envelope dispatcher.
    pub dispatcher: ExceptionDispatcher,
    /// Success helpers sharing the dispatcher's envelope settings.
    pub respond: Responder,
    /// Version resolution for the api router.
    pub versioning: versioning::ApiVersioning,
    /// Throttling for the api router, when enabled.
    pub limiter: Option<RateLimiter>,
    /// Origins allowed cross-origin access; empty disables CORS.
    pub cors_origins: Vec<String>,
    /// Demo data.
    pub store: api::DemoStore,
    /// Validation errors waiting for the page a form was redirected to.
    pub flash: flash::FlashStore,
}

impl AppState {
    /// Build state from a validated configuration.
    pub fn new(config: RestKitConfig) -> anyhow::Result<Self> {
        let dispatcher = ExceptionDispatcher::from_config(&config).context("build dispatcher")?;
        let versioning = versioning::ApiVersioning::from_config(&config.versioning)
            .context("build versioning")?;
        Ok(Self {
            respond: Responder::new(dispatcher.envelopes().clone()),
            dispatcher,
            versioning,
            limiter: None,
            cors_origins: Vec::new(),
            store: api::DemoStore::default(),
            flash: flash::FlashStore::default(),
            config: Arc::new(config),
        })
    }

    /// Allow each client `max_requests` api requests per `window`.
    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.limiter = Some(RateLimiter::new(max_requests, window));
        self
    }

    /// Allow cross-origin requests from `origins`.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}

/// Build the application router.
pub fn build_app(state: Arc<AppState>) -> Router {
    let mut api_routes = Router::new()
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/{id}", get(api::show_user))
        .route("/orders", get(api::list_orders).post(api::create_order))
        .route("/admin/settings", get(api::admin_settings));
    if let Some(limiter) = &state.limiter {
        api_routes = api_routes.layer(limiter.clone().into_layer());
    }
    let api_routes = api_routes
        .layer(from_fn_with_state(
            state.clone(),
            versioning::version_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), dispatch::force_json))
        .layer(route_group(API_GROUP));

    let web = Router::new()
        .route("/login", get(api::login_page))
        .route("/profile", get(api::profile_page))
        .route("/profile/update", post(api::update_profile))
        .route("/admin/settings", get(api::web_admin_settings))
        .layer(route_group(WEB_GROUP));

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/schema/config", get(api::config_schema))
        .nest(API_BASE, api_routes)
        .merge(web)
        .fallback(dispatch::route_not_found);
    let mut app = with_failure_dispatch(app, state.clone())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(RequestLogger::layer));
    if !state.cors_origins.is_empty() {
        app = app.layer(cors_layer(&state.cors_origins, state.versioning.header()));
    }
    app.with_state(state)
}

/// Route every failure leaving `router` through the dispatcher, panics
/// included. Add routes and the fallback before calling this.
pub fn with_failure_dispatch(
    router: Router<Arc<AppState>>,
    state: Arc<AppState>,
) -> Router<Arc<AppState>> {
    router
        .layer(CatchPanicLayer::custom(dispatch::panic_response))
        .layer(from_fn_with_state(state, dispatch::dispatch_failures))
}
