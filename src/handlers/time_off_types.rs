use actix_web::{HttpResponse, Result, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::database::models::{LeaveTypeInput, LeaveTypeUpdateInput};
use crate::handlers::shared::ApiResponse;
use crate::services::caller::{Claims, capability};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeListQuery {
    pub active_only: Option<bool>,
}

pub async fn list_types(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<TypeListQuery>,
) -> Result<HttpResponse> {
    claims.require(capability::TYPE_READ)?;

    let types = state
        .leave_types
        .list(query.active_only.unwrap_or(true))
        .await?;
    Ok(ApiResponse::ok(types))
}

pub async fn get_type(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    claims.require(capability::TYPE_READ)?;

    let leave_type = state.leave_types.get(path.into_inner()).await?;
    Ok(ApiResponse::ok(leave_type))
}

pub async fn create_type(
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<LeaveTypeInput>,
) -> Result<HttpResponse> {
    claims.require(capability::TYPE_MANAGE)?;

    let leave_type = state.leave_types.create(input.into_inner()).await?;
    Ok(ApiResponse::created(leave_type))
}

pub async fn update_type(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    input: web::Json<LeaveTypeUpdateInput>,
) -> Result<HttpResponse> {
    claims.require(capability::TYPE_MANAGE)?;

    let leave_type = state
        .leave_types
        .update(path.into_inner(), input.into_inner())
        .await?;
    Ok(ApiResponse::ok(leave_type))
}

/// Soft delete
pub async fn deactivate_type(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    claims.require(capability::TYPE_MANAGE)?;

    let leave_type = state.leave_types.deactivate(path.into_inner()).await?;
    Ok(ApiResponse::ok(leave_type))
}
