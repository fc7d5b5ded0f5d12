//! Case creation and read endpoints.

use super::parse_principal;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use haven_types::{CaseEvent, CaseId, CaseStats, CaseView, NearbyCase, Principal};
use serde::{Deserialize, Serialize};

/// Create case request (victim SOS).
#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub principal: Principal,
    pub latitude: String,
    pub longitude: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCaseResponse {
    pub success: bool,
    pub case_id: CaseId,
    pub case: CaseView,
}

pub async fn create_case(
    State(state): State<AppState>,
    Json(request): Json<CreateCaseRequest>,
) -> ApiResult<Json<CreateCaseResponse>> {
    let case = state
        .service
        .create_case(
            request.principal,
            request.latitude,
            request.longitude,
            request.idempotency_key,
        )
        .await?;

    Ok(Json(CreateCaseResponse {
        success: true,
        case_id: case.id,
        case,
    }))
}

#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub success: bool,
    pub case: CaseView,
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state.service.get_case(CaseId(id))?;
    Ok(Json(CaseResponse { success: true, case }))
}

#[derive(Debug, Serialize)]
pub struct CasesResponse {
    pub success: bool,
    pub count: usize,
    pub cases: Vec<CaseView>,
}

pub async fn cases_by_victim(
    State(state): State<AppState>,
    Path(principal): Path<String>,
) -> ApiResult<Json<CasesResponse>> {
    let principal = parse_principal(&principal)?;
    let cases = state.service.cases_by_victim(&principal);
    Ok(Json(CasesResponse {
        success: true,
        count: cases.len(),
        cases,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

fn default_radius_km() -> f64 {
    5.0
}

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub success: bool,
    pub count: usize,
    pub cases: Vec<NearbyCase>,
}

pub async fn nearby_cases(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> ApiResult<Json<NearbyResponse>> {
    let cases = state
        .service
        .nearby_open_cases(params.lat, params.lng, params.radius_km)?;
    Ok(Json(NearbyResponse {
        success: true,
        count: cases.len(),
        cases,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: CaseStats,
}

pub async fn case_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        success: true,
        stats: state.service.case_stats(),
    })
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub events: Vec<CaseEvent>,
}

pub async fn case_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<HistoryResponse>> {
    // Surface NotFound rather than an empty history for unknown ids.
    state.service.get_case(CaseId(id))?;
    Ok(Json(HistoryResponse {
        success: true,
        events: state.service.case_history(CaseId(id)),
    }))
}

/// Victim-only false alarm.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub principal: Principal,
}

pub async fn mark_false_alarm(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<CaseResponse>> {
    let case = state
        .service
        .mark_false_alarm(request.principal, CaseId(id))
        .await?;
    Ok(Json(CaseResponse { success: true, case }))
}
