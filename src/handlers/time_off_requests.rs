use actix_web::{HttpRequest, HttpResponse, Result, web};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::database::models::{LeaveRequestInput, ReviewInput};
use crate::handlers::shared::ApiResponse;
use crate::middleware::RequestIdExt;
use crate::services::caller::{Claims, capability};
use crate::services::requests::DEFAULT_PER_PAGE;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Create a time-off request for the caller
pub async fn create_request(
    req: HttpRequest,
    claims: Claims,
    state: web::Data<AppState>,
    input: web::Json<LeaveRequestInput>,
) -> Result<HttpResponse> {
    claims.require(capability::REQUEST_CREATE)?;

    let request = state
        .requests
        .create(claims.employee_id(), input.into_inner())
        .await
        .inspect_err(|e| {
            log::warn!(
                "Create request failed for {} (correlation_id={}): {}",
                claims.employee_id(),
                req.correlation_id().unwrap_or_default(),
                e
            )
        })?;
    Ok(ApiResponse::created(request))
}

pub async fn list_my_requests(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse> {
    claims.require(capability::REQUEST_READ_OWN)?;

    let requests = state.requests.list_mine(claims.employee_id()).await?;
    Ok(ApiResponse::ok(requests))
}

/// Requests of the caller's direct reports
pub async fn list_team_requests(
    claims: Claims,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    claims.require(capability::REQUEST_READ_TEAM)?;

    let requests = state.requests.list_for_team(claims.employee_id()).await?;
    Ok(ApiResponse::ok(requests))
}

pub async fn list_all_requests(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    claims.require(capability::REQUEST_READ_ALL)?;

    let page = state
        .requests
        .list_all(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Approved absences in a date range
pub async fn team_calendar(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<RangeQuery>,
) -> Result<HttpResponse> {
    if !claims.has(capability::REQUEST_READ_TEAM) {
        claims.require(capability::REQUEST_READ_ALL)?;
    }

    let requests = state
        .requests
        .list_approved_between(query.from, query.to)
        .await?;
    Ok(ApiResponse::ok(requests))
}

pub async fn get_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let request = state.requests.get_by_id(path.into_inner(), &claims).await?;
    Ok(ApiResponse::ok(request))
}

pub async fn review_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    input: web::Json<ReviewInput>,
) -> Result<HttpResponse> {
    claims.require(capability::REQUEST_APPROVE)?;

    let request = state
        .requests
        .review(path.into_inner(), claims.employee_id(), input.into_inner())
        .await?;
    Ok(ApiResponse::ok(request))
}

pub async fn cancel_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let request = state
        .requests
        .cancel(path.into_inner(), claims.employee_id())
        .await?;
    Ok(ApiResponse::ok(request))
}
