use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::AppError;

use database::{EmployeeDirectory, LeaveStore};
use services::{BalanceLedger, CalendarSync, LeaveTypeService, RequestEngine};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub leave_types: LeaveTypeService,
    pub ledger: BalanceLedger,
    pub requests: RequestEngine,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        directory: Arc<dyn EmployeeDirectory>,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        Self {
            leave_types: LeaveTypeService::new(store.clone()),
            ledger: BalanceLedger::new(store.clone(), directory.clone()),
            requests: RequestEngine::new(store, directory, calendar),
        }
    }
}
