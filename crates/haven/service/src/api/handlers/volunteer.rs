//! Volunteer engagement endpoints.

use super::cases::{ActorRequest, CaseResponse};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use haven_types::{CaseId, EngagementEntry, Principal};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
}

pub async fn accept_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<AckResponse>> {
    state
        .service
        .accept_case(request.principal, CaseId(id))
        .await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn submit_report(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<AckResponse>> {
    state
        .service
        .submit_report(request.principal, CaseId(id))
        .await?;
    Ok(Json(AckResponse { success: true }))
}

pub async fn query_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state
        .service
        .query_case(request.principal, CaseId(id))
        .await?;
    Ok(Json(CaseResponse { success: true, case }))
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<EngagementEntry>,
    pub accepted_volunteers: Vec<Principal>,
}

pub async fn engagement_logs(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<LogsResponse>> {
    state.service.get_case(CaseId(id))?;
    Ok(Json(LogsResponse {
        success: true,
        logs: state.service.logs_by_case(CaseId(id)),
        accepted_volunteers: state.service.accepted_volunteers(CaseId(id)),
    }))
}
