use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub batches_in_flight: usize,
}

/// `GET /`: plain-text liveness for hosting health checks.
pub async fn root() -> String {
    format!("{} is up and listening for receipts.", crate::config::APP_NAME)
}

/// `GET /health`
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        batches_in_flight: ctx.coordinator().in_flight(),
    })
}
