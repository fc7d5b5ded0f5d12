//! NGO response endpoints.

use super::cases::{ActorRequest, CaseResponse, CasesResponse};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use haven_types::{CaseId, Principal};
use serde::{Deserialize, Serialize};

pub async fn active_cases(State(state): State<AppState>) -> Json<CasesResponse> {
    let cases = state.service.active_cases();
    Json(CasesResponse {
        success: true,
        count: cases.len(),
        cases,
    })
}

pub async fn acknowledge_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state
        .service
        .acknowledge_case(request.principal, CaseId(id))
        .await?;
    Ok(Json(CaseResponse { success: true, case }))
}

#[derive(Debug, Serialize)]
pub struct EscalateResponse {
    pub success: bool,
    /// `false` when the case was already escalated (guarded no-op).
    pub changed: bool,
}

pub async fn escalate_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<EscalateResponse>> {
    let changed = state
        .service
        .escalate_case(request.principal, CaseId(id))
        .await?;
    Ok(Json(EscalateResponse {
        success: true,
        changed,
    }))
}

pub async fn resolve_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state
        .service
        .resolve_case(request.principal, CaseId(id))
        .await?;
    Ok(Json(CaseResponse { success: true, case }))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub principal: Principal,
    pub volunteer: Principal,
}

pub async fn assign_volunteer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state
        .service
        .assign_volunteer(request.principal, CaseId(id), request.volunteer)
        .await?;
    Ok(Json(CaseResponse { success: true, case }))
}
