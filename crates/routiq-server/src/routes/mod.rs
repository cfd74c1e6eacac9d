//! HTTP route handlers.

pub mod webhooks;

use axum::{
    Json, Router,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
};
use routiq_core::crypto::MAX_WEBHOOK_SIZE;
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    webhook_secret_configured: bool,
}

#[derive(Serialize)]
struct VersionResponse {
    version: &'static str,
    name: &'static str,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        webhook_secret_configured: state.verifier.is_configured(),
    })
}

async fn version() -> impl IntoResponse {
    Json(VersionResponse {
        version: routiq_core::VERSION,
        name: "routiqd",
    })
}

/// Creates the public API router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_check))
        .route("/version", get(version))
        // Webhooks (public, but signature-verified)
        .route("/webhooks/clerk", post(webhooks::handle_clerk_webhook))
        .route("/webhooks/events", get(webhooks::list_webhook_events))
        .route("/webhooks/events/{id}", get(webhooks::get_webhook_event))
        .with_state(state)
}

fn cors_layer(dashboard_origin: Option<&str>) -> CorsLayer {
    let origin = match dashboard_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            tracing::warn!("Invalid ROUTIQ_DASHBOARD_ORIGIN ({}), allowing any origin", e);
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Creates the full application with middleware applied.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(state.config.dashboard_origin.as_deref());

    Router::new()
        .nest("/api", api_router(state))
        .layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
