use actix_web::{HttpResponse, Result, web};
use uuid::Uuid;

use crate::AppState;
use crate::database::models::BalanceAdjustmentInput;
use crate::handlers::shared::{ApiResponse, YearQuery};
use crate::services::caller::{Claims, capability};

pub async fn my_balances(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse> {
    claims.require(capability::BALANCE_READ_OWN)?;

    let balances = state
        .ledger
        .get_balances(claims.employee_id(), query.year_or_current())
        .await?;
    Ok(ApiResponse::ok(balances))
}

/// Balances of any employee; the caller's own are always readable
pub async fn employee_balances(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse> {
    let employee_id = path.into_inner();
    if employee_id == claims.employee_id() {
        claims.require(capability::BALANCE_READ_OWN)?;
    } else {
        claims.require(capability::BALANCE_READ_ALL)?;
    }

    let balances = state
        .ledger
        .get_balances(employee_id, query.year_or_current())
        .await?;
    Ok(ApiResponse::ok(balances))
}

pub async fn adjust_balance(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
    query: web::Query<YearQuery>,
    input: web::Json<BalanceAdjustmentInput>,
) -> Result<HttpResponse> {
    claims.require(capability::BALANCE_ADJUST)?;

    let (employee_id, type_id) = path.into_inner();
    let input = input.into_inner();
    let balance = state
        .ledger
        .adjust_allocation(
            employee_id,
            type_id,
            query.year_or_current(),
            &input.adjustment,
            input.reason.as_deref(),
        )
        .await?;

    log::info!(
        "Employee {} adjusted balance of {} by {}",
        claims.employee_id(),
        employee_id,
        input.adjustment
    );
    Ok(ApiResponse::ok(balance))
}

pub async fn initialize_balances(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse> {
    claims.require(capability::BALANCE_ADJUST)?;

    let balances = state
        .ledger
        .initialize_for_employee(path.into_inner(), query.year_or_current())
        .await?;
    Ok(ApiResponse::created(balances))
}
