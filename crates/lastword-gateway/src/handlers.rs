// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Each handler forwards to one [`Engine`](lastword_scheduler::Engine)
//! operation and returns its result as JSON. Engine errors become an
//! [`ApiError`] with a status code chosen by error kind.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lastword_core::{
    EntryStats, LastwordError, PanicSignal, RegenerateOutcome, TriggerCondition,
};
use lastword_scheduler::{PanicOutcome, ProcessRequest, ProcessSummary, ReclaimReport};

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable kind, e.g. `not_found`.
    pub kind: &'static str,
}

/// An engine error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LastwordError);

impl From<LastwordError> for ApiError {
    fn from(err: LastwordError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LastwordError::NotFound { .. } => StatusCode::NOT_FOUND,
            LastwordError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LastwordError::NoRecipients { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LastwordError::Storage { .. } | LastwordError::Channel { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LastwordError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LastwordError::Config(_) | LastwordError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.tag(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub message_id: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserCheckInResponse {
    pub user_id: String,
    pub conditions_reset: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisarmResponse {
    pub message_id: String,
    pub disarmed: bool,
}

/// Request body for POST /v1/panic/reply.
#[derive(Debug, Deserialize)]
pub struct PanicReplyRequest {
    pub user_id: String,
    pub text: String,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /v1/process
///
/// An empty body runs an ordinary cycle.
pub async fn post_process(
    State(state): State<GatewayState>,
    body: Option<Json<ProcessRequest>>,
) -> ApiResult<ProcessSummary> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.engine.process(request).await?))
}

/// POST /v1/fix-stuck
pub async fn post_fix_stuck(State(state): State<GatewayState>) -> ApiResult<ReclaimReport> {
    Ok(Json(state.engine.fix_stuck().await?))
}

/// GET /v1/stats
pub async fn get_stats(State(state): State<GatewayState>) -> ApiResult<EntryStats> {
    Ok(Json(state.engine.stats().await?))
}

/// POST /v1/messages/{id}/regenerate
pub async fn post_regenerate(
    State(state): State<GatewayState>,
    Path(message_id): Path<String>,
) -> ApiResult<RegenerateOutcome> {
    Ok(Json(state.engine.regenerate_schedule(&message_id).await?))
}

/// POST /v1/messages/{id}/check-in
pub async fn post_check_in(
    State(state): State<GatewayState>,
    Path(message_id): Path<String>,
) -> ApiResult<CheckInResponse> {
    let deadline = state.engine.check_in(&message_id).await?;
    Ok(Json(CheckInResponse {
        message_id,
        deadline,
    }))
}

/// POST /v1/messages/{id}/disarm
pub async fn post_disarm(
    State(state): State<GatewayState>,
    Path(message_id): Path<String>,
) -> ApiResult<DisarmResponse> {
    let disarmed = state.engine.disarm(&message_id).await?;
    Ok(Json(DisarmResponse {
        message_id,
        disarmed,
    }))
}

/// POST /v1/conditions/{id}/arm
pub async fn post_arm(
    State(state): State<GatewayState>,
    Path(condition_id): Path<String>,
) -> ApiResult<TriggerCondition> {
    Ok(Json(state.engine.arm(&condition_id).await?))
}

/// POST /v1/users/{id}/check-in
pub async fn post_user_check_in(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserCheckInResponse> {
    let conditions_reset = state.engine.check_in_user(&user_id).await?;
    Ok(Json(UserCheckInResponse {
        user_id,
        conditions_reset,
    }))
}

/// POST /v1/panic
pub async fn post_panic(
    State(state): State<GatewayState>,
    Json(signal): Json<PanicSignal>,
) -> ApiResult<PanicOutcome> {
    Ok(Json(state.engine.trigger_panic(signal).await?))
}

/// POST /v1/panic/reply
pub async fn post_panic_reply(
    State(state): State<GatewayState>,
    Json(body): Json<PanicReplyRequest>,
) -> ApiResult<PanicOutcome> {
    Ok(Json(
        state.engine.reply_panic(&body.user_id, &body.text).await?,
    ))
}
