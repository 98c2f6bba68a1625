// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use lastword_config::model::GatewayConfig;
use lastword_core::LastwordError;
use lastword_scheduler::Engine;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the full route table.
///
/// `/health` is public; everything under `/v1` goes through the bearer
/// token check.
pub fn router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/process", post(handlers::post_process))
        .route("/v1/fix-stuck", post(handlers::post_fix_stuck))
        .route("/v1/stats", get(handlers::get_stats))
        .route(
            "/v1/messages/{id}/regenerate",
            post(handlers::post_regenerate),
        )
        .route("/v1/messages/{id}/check-in", post(handlers::post_check_in))
        .route("/v1/messages/{id}/disarm", post(handlers::post_disarm))
        .route("/v1/conditions/{id}/arm", post(handlers::post_arm))
        .route(
            "/v1/users/{id}/check-in",
            post(handlers::post_user_check_in),
        )
        .route("/v1/panic", post(handlers::post_panic))
        .route("/v1/panic/reply", post(handlers::post_panic_reply))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), LastwordError> {
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone(),
    };
    if auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set; /v1 routes are unauthenticated");
    }
    let app = router(state, auth);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LastwordError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| LastwordError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
