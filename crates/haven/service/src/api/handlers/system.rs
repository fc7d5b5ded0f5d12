//! Health and operational endpoints.

use crate::api::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: &'static str,
    pub version: String,
    pub uptime_seconds: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok",
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
}

/// Request an immediate escalation scan instead of waiting for the next
/// interval.
pub async fn trigger_scan(State(state): State<AppState>) -> Json<ScanResponse> {
    state.scheduler.trigger().await;
    Json(ScanResponse { success: true })
}
