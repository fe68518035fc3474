use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{Balance, BalanceKey, BalanceView, LeaveType};
use crate::database::store::{EmployeeDirectory, LeaveStore, StoreTx};
use crate::error::AppError;

/// Balance columns are `NUMERIC(5, 1)`.
const DAY_SCALE: i64 = 1;
const MAX_DAYS: i64 = 99_999; // 9999.9 at scale 1

fn max_days() -> BigDecimal {
    BigDecimal::new(MAX_DAYS.into(), DAY_SCALE)
}

/// Rejects amounts the balance columns would round or overflow.
fn ensure_storable(delta: &BigDecimal) -> Result<(), AppError> {
    if delta.with_scale(DAY_SCALE) != *delta {
        return Err(AppError::Validation(format!(
            "adjustment of {delta} has more than {DAY_SCALE} decimal place"
        )));
    }
    Ok(())
}

/// Locks the balance row for `key`, creating it first if this is the
/// key's very first use. A new row opens with the type's yearly default.
pub async fn lock_or_open(
    tx: &mut dyn StoreTx,
    key: BalanceKey,
    leave_type: &LeaveType,
) -> Result<Balance, AppError> {
    if let Some(balance) = tx.lock_balance(key).await? {
        return Ok(balance);
    }

    let opening = Balance::opening(key, BigDecimal::from(leave_type.default_days_per_year));
    tx.insert_balance(&opening).await?;
    log::debug!("Opened balance {} with {} days", key, opening.total_allocated);

    tx.lock_balance(key)
        .await?
        .ok_or_else(|| AppError::internal_server_error_message(format!("balance {key} vanished")))
}

/// Moves `delta` days into (positive) or out of (negative) `pending`.
///
/// Positive reservations against a capped type re-check the remaining
/// days under the row lock; the check and the write share one transaction.
pub async fn reserve_pending(
    tx: &mut dyn StoreTx,
    leave_type: &LeaveType,
    employee_id: Uuid,
    year: i32,
    delta: &BigDecimal,
) -> Result<Balance, AppError> {
    let key = BalanceKey::new(employee_id, leave_type.id, year);
    let mut balance = lock_or_open(tx, key, leave_type).await?;

    let new_pending = &balance.pending + delta;
    if new_pending < BigDecimal::zero() {
        return Err(AppError::Conflict(format!(
            "pending days on {key} would become negative"
        )));
    }

    if delta > &BigDecimal::zero() && !leave_type.is_unlimited {
        let remaining = balance.remaining();
        if &remaining - delta < BigDecimal::zero() {
            return Err(AppError::InsufficientBalance {
                requested: delta.clone(),
                remaining,
            });
        }
    }

    balance.pending = new_pending;
    balance.updated_at = Utc::now();
    tx.update_balance(&balance).await?;

    log::debug!("Pending on {} moved by {} to {}", key, delta, balance.pending);
    Ok(balance)
}

/// Moves `delta` days into or out of `used`. Never checks sufficiency.
pub async fn commit_used(
    tx: &mut dyn StoreTx,
    leave_type: &LeaveType,
    employee_id: Uuid,
    year: i32,
    delta: &BigDecimal,
) -> Result<Balance, AppError> {
    let key = BalanceKey::new(employee_id, leave_type.id, year);
    let mut balance = lock_or_open(tx, key, leave_type).await?;

    let new_used = &balance.used + delta;
    if new_used < BigDecimal::zero() {
        return Err(AppError::Conflict(format!(
            "used days on {key} would become negative"
        )));
    }

    balance.used = new_used;
    balance.updated_at = Utc::now();
    tx.update_balance(&balance).await?;

    log::debug!("Used on {} moved by {} to {}", key, delta, balance.used);
    Ok(balance)
}

/// Administrative side of the ledger: allocation changes and read models.
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn LeaveStore>,
    directory: Arc<dyn EmployeeDirectory>,
}

impl BalanceLedger {
    pub fn new(store: Arc<dyn LeaveStore>, directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { store, directory }
    }

    pub async fn adjust_allocation(
        &self,
        employee_id: Uuid,
        type_id: Uuid,
        year: i32,
        delta: &BigDecimal,
        reason: Option<&str>,
    ) -> Result<BalanceView, AppError> {
        ensure_storable(delta)?;
        self.ensure_employee(employee_id).await?;
        let leave_type = self
            .store
            .find_type(type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("time-off type {type_id}")))?;

        let key = BalanceKey::new(employee_id, type_id, year);
        let mut tx = self.store.begin().await?;
        let mut balance = lock_or_open(tx.as_mut(), key, &leave_type).await?;

        let new_total = &balance.total_allocated + delta;
        if new_total < BigDecimal::zero() {
            log::warn!(
                "Rejected adjustment of {} on {}: allocation {} would go negative",
                delta,
                key,
                balance.total_allocated
            );
            return Err(AppError::Validation(format!(
                "adjustment of {delta} would make the allocation negative"
            )));
        }
        if new_total > max_days() {
            return Err(AppError::Validation(format!(
                "adjustment of {delta} would take the allocation above {}",
                max_days()
            )));
        }

        balance.total_allocated = new_total;
        balance.updated_at = Utc::now();
        tx.update_balance(&balance).await?;
        tx.commit().await?;

        log::info!(
            "Adjusted allocation on {} by {} (reason: {})",
            key,
            delta,
            reason.unwrap_or("none given")
        );
        Ok(BalanceView::new(
            &balance,
            &leave_type.name,
            leave_type.is_unlimited,
        ))
    }

    /// Opens a row for every active type the employee has none for in `year`.
    pub async fn initialize_for_employee(
        &self,
        employee_id: Uuid,
        year: i32,
    ) -> Result<Vec<BalanceView>, AppError> {
        self.ensure_employee(employee_id).await?;

        let mut tx = self.store.begin().await?;
        let mut opened = 0;
        for leave_type in tx.active_types().await? {
            let key = BalanceKey::new(employee_id, leave_type.id, year);
            if tx.lock_balance(key).await?.is_none() {
                let total = BigDecimal::from(leave_type.default_days_per_year);
                tx.insert_balance(&Balance::opening(key, total)).await?;
                opened += 1;
            }
        }
        tx.commit().await?;

        log::info!(
            "Initialized {} balance rows for employee {} in {}",
            opened,
            employee_id,
            year
        );
        self.get_balances(employee_id, year).await
    }

    pub async fn get_balances(
        &self,
        employee_id: Uuid,
        year: i32,
    ) -> Result<Vec<BalanceView>, AppError> {
        self.ensure_employee(employee_id).await?;

        let types: HashMap<Uuid, LeaveType> = self
            .store
            .list_types(false)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut views: Vec<BalanceView> = self
            .store
            .list_balances(employee_id, year)
            .await?
            .iter()
            .map(|balance| match types.get(&balance.time_off_type_id) {
                Some(t) => BalanceView::new(balance, &t.name, t.is_unlimited),
                None => BalanceView::new(balance, "", false),
            })
            .collect();
        views.sort_by(|a, b| a.time_off_type_name.cmp(&b.time_off_type_name));
        Ok(views)
    }

    async fn ensure_employee(&self, employee_id: Uuid) -> Result<(), AppError> {
        match self.directory.find_employee(employee_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("employee {employee_id}"))),
        }
    }
}
