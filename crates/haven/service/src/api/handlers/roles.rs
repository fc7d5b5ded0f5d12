//! Role grant and query endpoints.

use super::parse_principal;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use haven_types::{Principal, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub principal: Principal,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub success: bool,
    /// `false` when the principal already held the role.
    pub granted: bool,
}

pub async fn grant_role(
    State(state): State<AppState>,
    Json(request): Json<GrantRequest>,
) -> ApiResult<Json<GrantResponse>> {
    let role: Role = request.role.parse().map_err(crate::error::ApiError)?;
    let granted = state.service.grant_role(request.principal, role).await?;
    Ok(Json(GrantResponse {
        success: true,
        granted,
    }))
}

/// Reconcile role labels pulled from an external profile store.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub principal: Principal,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub granted: Vec<Role>,
}

pub async fn reconcile_roles(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> ApiResult<Json<ReconcileResponse>> {
    let granted = state
        .service
        .reconcile_roles(request.principal, &request.roles)
        .await?;
    Ok(Json(ReconcileResponse {
        success: true,
        granted,
    }))
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub success: bool,
    pub principal: Principal,
    pub roles: Vec<Role>,
}

pub async fn get_roles(
    State(state): State<AppState>,
    Path(principal): Path<String>,
) -> ApiResult<Json<RolesResponse>> {
    let principal = parse_principal(&principal)?;
    Ok(Json(RolesResponse {
        success: true,
        principal,
        roles: state.service.get_roles(&principal),
    }))
}

#[derive(Debug, Serialize)]
pub struct HasRoleResponse {
    pub success: bool,
    pub principal: Principal,
    pub role: Role,
    pub has_role: bool,
}

pub async fn has_role(
    State(state): State<AppState>,
    Path((principal, role)): Path<(String, String)>,
) -> ApiResult<Json<HasRoleResponse>> {
    let principal = parse_principal(&principal)?;
    let role: Role = role.parse().map_err(crate::error::ApiError)?;
    Ok(Json(HasRoleResponse {
        success: true,
        principal,
        role,
        has_role: state.service.has_role(&principal, role),
    }))
}
