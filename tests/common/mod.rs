#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use fake::{Fake, faker::name::en::Name};
use uuid::Uuid;

use leave::AppState;
use leave::database::models::{
    Balance, BalanceKey, Employee, HalfDayPeriod, LeaveRequestInput, LeaveType, LeaveTypeInput,
};
use leave::database::{LeaveStore, MemoryStore};
use leave::services::calendar::{CalendarEntry, CalendarSync};

/// Calendar double that records every call and hands out sequential ids.
#[derive(Default)]
pub struct RecordingCalendar {
    pub created: Mutex<Vec<CalendarEntry>>,
    pub deleted: Mutex<Vec<String>>,
    pub unreachable: AtomicBool,
    next_id: AtomicUsize,
}

impl RecordingCalendar {
    pub fn created(&self) -> Vec<CalendarEntry> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn go_offline(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CalendarSync for RecordingCalendar {
    async fn create_event(&self, entry: &CalendarEntry) -> Option<String> {
        self.created.lock().unwrap().push(entry.clone());
        if self.unreachable.load(Ordering::SeqCst) || entry.identity.is_none() {
            return None;
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("evt-{n}"))
    }

    async fn delete_event(&self, _identity: Option<&str>, event_id: &str) {
        self.deleted.lock().unwrap().push(event_id.to_string());
    }
}

pub struct Fixture {
    pub store: MemoryStore,
    pub calendar: Arc<RecordingCalendar>,
    pub state: AppState,
    pub annual: LeaveType,
    pub sick: LeaveType,
    pub personal: LeaveType,
    pub manager: Employee,
    pub employee: Employee,
    pub colleague: Employee,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_lock_wait(Duration::from_secs(2))
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        let store = MemoryStore::with_lock_wait(lock_wait);
        let calendar = Arc::new(RecordingCalendar::default());

        let annual = leave_type("Annual Leave", 20, false);
        let sick = leave_type("Sick Leave", 0, true);
        let personal = leave_type("Personal Leave", 3, false);
        for t in [&annual, &sick, &personal] {
            store.insert_type(t.clone());
        }

        let manager = employee(None, true);
        let employee_row = employee(Some(manager.id), true);
        let colleague = employee(Some(manager.id), false);
        for e in [&manager, &employee_row, &colleague] {
            store.insert_employee(e.clone());
        }

        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            calendar.clone(),
        );

        Self {
            store,
            calendar,
            state,
            annual,
            sick,
            personal,
            manager,
            employee: employee_row,
            colleague,
        }
    }

    /// Seeds a committed balance row with the given allocation and usage.
    pub fn seed_balance(&self, employee_id: Uuid, leave_type: &LeaveType, total: i64, used: i64) {
        let mut balance = Balance::opening(
            BalanceKey::new(employee_id, leave_type.id, 2025),
            BigDecimal::from(total),
        );
        balance.used = BigDecimal::from(used);
        self.store.insert_balance(balance);
    }

    pub async fn balance(&self, employee_id: Uuid, leave_type: &LeaveType) -> Option<Balance> {
        self.store
            .find_balance(BalanceKey::new(employee_id, leave_type.id, 2025))
            .await
            .unwrap()
    }
}

pub fn leave_type(name: &str, days: i32, unlimited: bool) -> LeaveType {
    LeaveType::from_input(LeaveTypeInput {
        name: name.to_string(),
        description: None,
        default_days_per_year: days,
        carry_over_allowed: None,
        max_carry_over_days: None,
        requires_approval: None,
        is_unlimited: Some(unlimited),
    })
}

pub fn employee(reports_to: Option<Uuid>, with_calendar: bool) -> Employee {
    let id = Uuid::new_v4();
    Employee {
        id,
        full_name: Name().fake(),
        email: Some(format!("{}@example.com", id.simple())),
        reports_to,
        calendar_identity: with_calendar.then(|| format!("{}@example.com", id.simple())),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn full_days(leave_type: &LeaveType, start: NaiveDate, end: NaiveDate) -> LeaveRequestInput {
    LeaveRequestInput {
        time_off_type_id: leave_type.id,
        start_date: start,
        end_date: end,
        half_day: false,
        half_day_period: None,
        reason: Some(format!("created at {}", Utc::now())),
    }
}

pub fn half_day(leave_type: &LeaveType, day: NaiveDate, period: HalfDayPeriod) -> LeaveRequestInput {
    LeaveRequestInput {
        time_off_type_id: leave_type.id,
        start_date: day,
        end_date: day,
        half_day: true,
        half_day_period: Some(period),
        reason: None,
    }
}

pub fn days(value: &str) -> BigDecimal {
    value.parse().unwrap()
}
