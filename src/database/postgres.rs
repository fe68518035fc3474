use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{Balance, BalanceKey, Employee, LeaveRequest, LeaveType};
use crate::database::repositories::{
    employee, time_off_balance, time_off_request, time_off_type,
};
use crate::database::store::{EmployeeDirectory, LeaveStore, StoreTx};
use crate::error::AppError;

/// [`LeaveStore`] backed by Postgres.
///
/// Row locks are `SELECT ... FOR UPDATE` bounded by a per-transaction
/// `lock_timeout`; an expired wait surfaces as `TransientConflict`.
#[derive(Clone)]
pub struct PgLeaveStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgLeaveStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LeaveStore for PgLeaveStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let mut tx = self.pool.begin().await?;
        // SET LOCAL does not take bind parameters.
        let statement = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&statement).execute(&mut *tx).await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_type(&self, id: Uuid) -> Result<Option<LeaveType>, AppError> {
        Ok(time_off_type::find_by_id(&self.pool, id).await?)
    }

    async fn list_types(&self, active_only: bool) -> Result<Vec<LeaveType>, AppError> {
        Ok(time_off_type::list(&self.pool, active_only).await?)
    }

    async fn find_balance(&self, key: BalanceKey) -> Result<Option<Balance>, AppError> {
        Ok(time_off_balance::find_by_key(&self.pool, key).await?)
    }

    async fn list_balances(&self, employee_id: Uuid, year: i32) -> Result<Vec<Balance>, AppError> {
        Ok(time_off_balance::list_for_employee(&self.pool, employee_id, year).await?)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        Ok(time_off_request::find_by_id(&self.pool, id).await?)
    }

    async fn list_requests_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(time_off_request::list_for_employee(&self.pool, employee_id).await?)
    }

    async fn list_requests_for_manager(
        &self,
        manager_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(time_off_request::list_for_manager(&self.pool, manager_id).await?)
    }

    async fn list_requests(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<LeaveRequest>, i64), AppError> {
        let items = time_off_request::list_page(&self.pool, offset, limit).await?;
        let total = time_off_request::count(&self.pool).await?;
        Ok((items, total))
    }

    async fn list_approved_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(time_off_request::list_approved_between(&self.pool, from, to).await?)
    }
}

#[async_trait]
impl EmployeeDirectory for PgLeaveStore {
    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>, AppError> {
        Ok(employee::find_by_id(&self.pool, id).await?)
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_balance(&mut self, key: BalanceKey) -> Result<Option<Balance>, AppError> {
        Ok(time_off_balance::lock_by_key(&mut *self.tx, key).await?)
    }

    async fn insert_balance(&mut self, balance: &Balance) -> Result<(), AppError> {
        Ok(time_off_balance::insert_if_absent(&mut *self.tx, balance).await?)
    }

    async fn update_balance(&mut self, balance: &Balance) -> Result<(), AppError> {
        Ok(time_off_balance::update(&mut *self.tx, balance).await?)
    }

    async fn lock_request(&mut self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        Ok(time_off_request::lock_by_id(&mut *self.tx, id).await?)
    }

    async fn find_open_overlapping(
        &mut self,
        employee_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(time_off_request::find_open_overlapping(&mut *self.tx, employee_id, start, end).await?)
    }

    async fn insert_request(&mut self, request: &LeaveRequest) -> Result<(), AppError> {
        Ok(time_off_request::insert(&mut *self.tx, request).await?)
    }

    async fn update_request(&mut self, request: &LeaveRequest) -> Result<(), AppError> {
        Ok(time_off_request::update(&mut *self.tx, request).await?)
    }

    async fn lock_type(&mut self, id: Uuid) -> Result<Option<LeaveType>, AppError> {
        Ok(time_off_type::lock_by_id(&mut *self.tx, id).await?)
    }

    async fn find_active_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<LeaveType>, AppError> {
        Ok(time_off_type::find_active_by_name(&mut *self.tx, name).await?)
    }

    async fn insert_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError> {
        Ok(time_off_type::insert(&mut *self.tx, leave_type).await?)
    }

    async fn update_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError> {
        Ok(time_off_type::update(&mut *self.tx, leave_type).await?)
    }

    async fn active_types(&mut self) -> Result<Vec<LeaveType>, AppError> {
        Ok(time_off_type::list(&mut *self.tx, true).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
