use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::database::models::{Balance, BalanceKey, Employee, LeaveRequest, LeaveType};
use crate::error::AppError;

/// Read side of the employee directory collaborator.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>, AppError>;
}

/// Persistent home of leave types, balances and requests.
///
/// Plain reads go straight to the store; anything that mutates state opens a
/// [`StoreTx`]. A transaction that is dropped without [`StoreTx::commit`]
/// leaves no trace.
#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    async fn find_type(&self, id: Uuid) -> Result<Option<LeaveType>, AppError>;

    async fn list_types(&self, active_only: bool) -> Result<Vec<LeaveType>, AppError>;

    async fn find_balance(&self, key: BalanceKey) -> Result<Option<Balance>, AppError>;

    async fn list_balances(&self, employee_id: Uuid, year: i32) -> Result<Vec<Balance>, AppError>;

    async fn find_request(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError>;

    /// Newest first.
    async fn list_requests_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError>;

    /// Requests of every employee whose direct manager is `manager_id`, newest first.
    async fn list_requests_for_manager(
        &self,
        manager_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError>;

    /// One page of all requests, newest first, with the overall count.
    async fn list_requests(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<LeaveRequest>, i64), AppError>;

    async fn list_approved_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError>;
}

/// One unit of work. Locks taken through it are held until commit or drop.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads the balance row and holds its exclusive lock. Fails with
    /// `TransientConflict` when the lock cannot be acquired in time.
    async fn lock_balance(&mut self, key: BalanceKey) -> Result<Option<Balance>, AppError>;

    /// Inserts a row unless one already exists for the same key.
    async fn insert_balance(&mut self, balance: &Balance) -> Result<(), AppError>;

    async fn update_balance(&mut self, balance: &Balance) -> Result<(), AppError>;

    /// Reads the request and holds its exclusive lock.
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<LeaveRequest>, AppError>;

    /// Pending or approved requests of the employee intersecting `[start, end]`.
    async fn find_open_overlapping(
        &mut self,
        employee_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError>;

    async fn insert_request(&mut self, request: &LeaveRequest) -> Result<(), AppError>;

    async fn update_request(&mut self, request: &LeaveRequest) -> Result<(), AppError>;

    async fn lock_type(&mut self, id: Uuid) -> Result<Option<LeaveType>, AppError>;

    /// Active type with the name (case-insensitive), if any.
    async fn find_active_type_by_name(&mut self, name: &str)
    -> Result<Option<LeaveType>, AppError>;

    async fn insert_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError>;

    async fn update_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError>;

    async fn active_types(&mut self) -> Result<Vec<LeaveType>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
