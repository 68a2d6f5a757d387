// HTTP API: health/version in the open, everything else behind the bearer token.

mod auth;
mod error;
mod http;

pub use error::ApiError;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::host::HostMetrics;
use crate::store::MetricStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<MetricStore>,
    pub(crate) host: Arc<dyn HostMetrics>,
    pub(crate) config: Arc<AppConfig>,
}

pub fn app(store: Arc<MetricStore>, host: Arc<dyn HostMetrics>, config: AppConfig) -> Router {
    let debug = config.server.debug;
    let state = AppState {
        store,
        host,
        config: Arc::new(config),
    };

    let mut protected = Router::new()
        .route("/api/cpu/current", get(http::cpu_current)) // GET /api/cpu/current
        .route("/api/cpu/history", get(http::cpu_history)) // GET /api/cpu/history?from&to
        .route("/api/memory/current", get(http::memory_current)) // GET /api/memory/current
        .route("/api/memory/history", get(http::memory_history)) // GET /api/memory/history?from&to
        .route(
            "/api/container/{id}/cpu/history",
            get(http::container_cpu_history),
        )
        .route(
            "/api/container/{id}/memory/history",
            get(http::container_memory_history),
        );
    if debug {
        protected = protected
            .route("/api/vacuum", post(http::vacuum)) // POST /api/vacuum
            .route("/api/checkpoint", post(http::checkpoint)) // POST /api/checkpoint
            .route("/api/stats", get(http::stats)); // GET /api/stats
    }
    let protected = protected.route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_bearer,
    ));

    Router::new()
        .route("/api/health", get(|| async { "ok" })) // GET /api/health
        .route("/api/version", get(http::version_handler)) // GET /api/version
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
