use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::models::{Balance, BalanceKey, Employee, LeaveRequest, LeaveType};
use crate::database::store::{EmployeeDirectory, LeaveStore, StoreTx};
use crate::error::AppError;

const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone)]
struct Tables {
    employees: HashMap<Uuid, Employee>,
    types: HashMap<Uuid, LeaveType>,
    balances: HashMap<BalanceKey, Balance>,
    requests: HashMap<Uuid, LeaveRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Balance(BalanceKey),
    Request(Uuid),
    Type(Uuid),
    TypeNames,
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Balance(key) => write!(f, "balance {key}"),
            LockKey::Request(id) => write!(f, "request {id}"),
            LockKey::Type(id) => write!(f, "time-off type {id}"),
            LockKey::TypeNames => f.write_str("time-off type names"),
        }
    }
}

struct Inner {
    tables: Mutex<Tables>,
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
    lock_wait: Duration,
}

impl Inner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }

    /// Releases the guards and forgets every lock nobody else is holding or
    /// waiting on.
    fn release(&self, guards: Vec<(LockKey, OwnedMutexGuard<()>)>) {
        if guards.is_empty() {
            return;
        }
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, guard) in guards {
            drop(guard);
            if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&key);
            }
        }
    }
}

/// Process-local [`LeaveStore`] with the same transactional contract as the
/// Postgres store: per-row exclusive locks with a bounded wait, staged writes
/// that only become visible on commit.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                locks: Mutex::new(HashMap::new()),
                lock_wait,
            }),
        }
    }

    pub fn insert_employee(&self, employee: Employee) {
        self.inner.tables().employees.insert(employee.id, employee);
    }

    pub fn insert_type(&self, leave_type: LeaveType) {
        self.inner.tables().types.insert(leave_type.id, leave_type);
    }

    pub fn insert_balance(&self, balance: Balance) {
        self.inner.tables().balances.insert(balance.key(), balance);
    }

    /// Every committed request, in no particular order.
    pub fn requests(&self) -> Vec<LeaveRequest> {
        self.inner.tables().requests.values().cloned().collect()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.inner.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryStore {
    async fn find_employee(&self, id: Uuid) -> Result<Option<Employee>, AppError> {
        Ok(self.inner.tables().employees.get(&id).cloned())
    }
}

fn newest_first(mut requests: Vec<LeaveRequest>) -> Vec<LeaveRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            guards: Vec::new(),
            staged_types: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_requests: HashMap::new(),
        }))
    }

    async fn find_type(&self, id: Uuid) -> Result<Option<LeaveType>, AppError> {
        Ok(self.inner.tables().types.get(&id).cloned())
    }

    async fn list_types(&self, active_only: bool) -> Result<Vec<LeaveType>, AppError> {
        let mut types: Vec<LeaveType> = self
            .inner
            .tables()
            .types
            .values()
            .filter(|t| t.is_active || !active_only)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn find_balance(&self, key: BalanceKey) -> Result<Option<Balance>, AppError> {
        Ok(self.inner.tables().balances.get(&key).cloned())
    }

    async fn list_balances(&self, employee_id: Uuid, year: i32) -> Result<Vec<Balance>, AppError> {
        Ok(self
            .inner
            .tables()
            .balances
            .values()
            .filter(|b| b.employee_id == employee_id && b.year == year)
            .cloned()
            .collect())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        Ok(self.inner.tables().requests.get(&id).cloned())
    }

    async fn list_requests_for_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let requests = self
            .inner
            .tables()
            .requests
            .values()
            .filter(|r| r.employee_id == employee_id)
            .cloned()
            .collect();
        Ok(newest_first(requests))
    }

    async fn list_requests_for_manager(
        &self,
        manager_id: Uuid,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let tables = self.inner.tables();
        let requests = tables
            .requests
            .values()
            .filter(|r| {
                tables
                    .employees
                    .get(&r.employee_id)
                    .is_some_and(|e| e.is_direct_report_of(manager_id))
            })
            .cloned()
            .collect();
        Ok(newest_first(requests))
    }

    async fn list_requests(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<LeaveRequest>, i64), AppError> {
        let all = newest_first(self.inner.tables().requests.values().cloned().collect());
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_approved_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let tables = self.inner.tables();
        let type_name = |id: &Uuid| tables.types.get(id).map(|t| t.name.clone());
        let employee_name = |id: &Uuid| tables.employees.get(id).map(|e| e.full_name.clone());

        let mut approved: Vec<LeaveRequest> = tables
            .requests
            .values()
            .filter(|r| r.status == crate::database::models::LeaveRequestStatus::Approved)
            .filter(|r| r.intersects(from, to))
            .cloned()
            .collect();
        approved.sort_by(|a, b| {
            type_name(&a.time_off_type_id)
                .cmp(&type_name(&b.time_off_type_id))
                .then_with(|| employee_name(&a.employee_id).cmp(&employee_name(&b.employee_id)))
                .then_with(|| a.start_date.cmp(&b.start_date))
        });
        Ok(approved)
    }
}

/// Unit of work over a [`MemoryStore`]. Dropping it releases its locks and
/// discards everything staged.
pub struct MemoryTx {
    inner: Arc<Inner>,
    guards: Vec<(LockKey, OwnedMutexGuard<()>)>,
    staged_types: HashMap<Uuid, LeaveType>,
    staged_balances: HashMap<BalanceKey, Balance>,
    staged_requests: HashMap<Uuid, LeaveRequest>,
}

impl MemoryTx {
    /// Locks are reentrant within one transaction.
    async fn acquire(&mut self, key: LockKey) -> Result<(), AppError> {
        if self.guards.iter().any(|(held, _)| *held == key) {
            return Ok(());
        }

        let lock = self.inner.lock_for(key);
        match tokio::time::timeout(self.inner.lock_wait, lock.lock_owned()).await {
            Ok(guard) => {
                self.guards.push((key, guard));
                Ok(())
            }
            Err(_) => {
                log::warn!("Timed out waiting for lock on {}", key);
                Err(AppError::TransientConflict(format!(
                    "timed out waiting for lock on {key}"
                )))
            }
        }
    }

    fn balance(&self, key: &BalanceKey) -> Option<Balance> {
        self.staged_balances
            .get(key)
            .cloned()
            .or_else(|| self.inner.tables().balances.get(key).cloned())
    }

    fn request(&self, id: &Uuid) -> Option<LeaveRequest> {
        self.staged_requests
            .get(id)
            .cloned()
            .or_else(|| self.inner.tables().requests.get(id).cloned())
    }

    fn leave_type(&self, id: &Uuid) -> Option<LeaveType> {
        self.staged_types
            .get(id)
            .cloned()
            .or_else(|| self.inner.tables().types.get(id).cloned())
    }

    /// Committed types overlaid with this transaction's staged ones.
    fn visible_types(&self) -> Vec<LeaveType> {
        let mut types = self.inner.tables().types.clone();
        types.extend(self.staged_types.clone());
        types.into_values().collect()
    }

    fn visible_requests(&self) -> Vec<LeaveRequest> {
        let mut requests = self.inner.tables().requests.clone();
        requests.extend(self.staged_requests.clone());
        requests.into_values().collect()
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_balance(&mut self, key: BalanceKey) -> Result<Option<Balance>, AppError> {
        self.acquire(LockKey::Balance(key)).await?;
        Ok(self.balance(&key))
    }

    async fn insert_balance(&mut self, balance: &Balance) -> Result<(), AppError> {
        let key = balance.key();
        self.acquire(LockKey::Balance(key)).await?;
        if self.balance(&key).is_none() {
            self.staged_balances.insert(key, balance.clone());
        }
        Ok(())
    }

    async fn update_balance(&mut self, balance: &Balance) -> Result<(), AppError> {
        let key = balance.key();
        self.acquire(LockKey::Balance(key)).await?;
        if self.balance(&key).is_none() {
            return Err(AppError::NotFound(format!("balance {key}")));
        }
        self.staged_balances.insert(key, balance.clone());
        Ok(())
    }

    async fn lock_request(&mut self, id: Uuid) -> Result<Option<LeaveRequest>, AppError> {
        self.acquire(LockKey::Request(id)).await?;
        Ok(self.request(&id))
    }

    async fn find_open_overlapping(
        &mut self,
        employee_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(self
            .visible_requests()
            .into_iter()
            .filter(|r| r.employee_id == employee_id)
            .filter(|r| r.status.is_open() && r.intersects(start, end))
            .collect())
    }

    async fn insert_request(&mut self, request: &LeaveRequest) -> Result<(), AppError> {
        self.acquire(LockKey::Request(request.id)).await?;
        if self.request(&request.id).is_some() {
            return Err(AppError::Conflict(format!("request {} already exists", request.id)));
        }
        self.staged_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_request(&mut self, request: &LeaveRequest) -> Result<(), AppError> {
        self.acquire(LockKey::Request(request.id)).await?;
        self.staged_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn lock_type(&mut self, id: Uuid) -> Result<Option<LeaveType>, AppError> {
        self.acquire(LockKey::Type(id)).await?;
        Ok(self.leave_type(&id))
    }

    async fn find_active_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<LeaveType>, AppError> {
        self.acquire(LockKey::TypeNames).await?;
        Ok(self
            .visible_types()
            .into_iter()
            .find(|t| t.is_active && t.name_matches(name)))
    }

    async fn insert_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError> {
        self.acquire(LockKey::Type(leave_type.id)).await?;
        self.staged_types.insert(leave_type.id, leave_type.clone());
        Ok(())
    }

    async fn update_type(&mut self, leave_type: &LeaveType) -> Result<(), AppError> {
        self.acquire(LockKey::Type(leave_type.id)).await?;
        self.staged_types.insert(leave_type.id, leave_type.clone());
        Ok(())
    }

    async fn active_types(&mut self) -> Result<Vec<LeaveType>, AppError> {
        let mut types: Vec<LeaveType> = self
            .visible_types()
            .into_iter()
            .filter(|t| t.is_active)
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        let staged_types = std::mem::take(&mut self.staged_types);
        let staged_balances = std::mem::take(&mut self.staged_balances);
        let staged_requests = std::mem::take(&mut self.staged_requests);

        let mut tables = self.inner.tables();
        tables.types.extend(staged_types);
        tables.balances.extend(staged_balances);
        tables.requests.extend(staged_requests);
        drop(tables);

        // Locks go when `self` drops, after the writes are visible.
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.inner.release(std::mem::take(&mut self.guards));
    }
}
