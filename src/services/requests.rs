use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::{Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::models::{
    BalanceKey, HalfDayPeriod, LeaveRequest, LeaveRequestInput, LeaveRequestStatus,
    LeaveRequestView, LeaveType, Paged, ReviewDecision, ReviewInput,
};
use crate::database::store::{EmployeeDirectory, LeaveStore};
use crate::error::AppError;
use crate::services::business_days::business_days;
use crate::services::calendar::{CalendarEntry, CalendarSync};
use crate::services::caller::{Claims, capability};
use crate::services::ledger;

const MAX_REASON_LEN: usize = 1000;
pub const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Owns the request lifecycle: PENDING to APPROVED, REJECTED or CANCELLED,
/// and APPROVED to CANCELLED. Every transition moves the matching ledger
/// delta in the same transaction; calendar sync happens after commit.
#[derive(Clone)]
pub struct RequestEngine {
    store: Arc<dyn LeaveStore>,
    directory: Arc<dyn EmployeeDirectory>,
    calendar: Arc<dyn CalendarSync>,
}

impl RequestEngine {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        directory: Arc<dyn EmployeeDirectory>,
        calendar: Arc<dyn CalendarSync>,
    ) -> Self {
        Self {
            store,
            directory,
            calendar,
        }
    }

    pub async fn create(
        &self,
        employee_id: Uuid,
        input: LeaveRequestInput,
    ) -> Result<LeaveRequestView, AppError> {
        let period = validate_input(&input)?;
        self.require_employee(employee_id).await?;

        let leave_type = self.require_type(input.time_off_type_id).await?;
        if !leave_type.is_active {
            return Err(AppError::Validation(format!(
                "time-off type '{}' is no longer active",
                leave_type.name
            )));
        }

        let days = business_days(input.start_date, input.end_date, input.half_day);
        if days <= BigDecimal::zero() {
            return Err(AppError::Validation(
                "the requested range contains no working days".into(),
            ));
        }

        let year = input.start_date.year();
        let key = BalanceKey::new(employee_id, leave_type.id, year);
        let mut tx = self.store.begin().await?;

        // Holding the balance row serialises creates for the same key.
        let balance = ledger::lock_or_open(tx.as_mut(), key, &leave_type).await?;

        let existing = tx
            .find_open_overlapping(employee_id, input.start_date, input.end_date)
            .await?;
        if let Some(clash) = existing
            .iter()
            .find(|r| is_conflict(r, input.start_date, input.end_date, period))
        {
            return Err(AppError::Conflict(format!(
                "overlaps request {} ({} to {})",
                clash.id, clash.start_date, clash.end_date
            )));
        }

        if !leave_type.is_unlimited {
            let remaining = balance.remaining();
            if remaining < days {
                return Err(AppError::InsufficientBalance {
                    requested: days,
                    remaining,
                });
            }
        }

        let now = Utc::now();
        let request = LeaveRequest {
            id: Uuid::new_v4(),
            employee_id,
            time_off_type_id: leave_type.id,
            start_date: input.start_date,
            end_date: input.end_date,
            half_day: input.half_day,
            half_day_period: period,
            business_days: days,
            reason: input.reason.filter(|r| !r.trim().is_empty()),
            status: LeaveRequestStatus::Pending,
            reviewer_id: None,
            review_note: None,
            reviewed_at: None,
            calendar_event_id: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_request(&request).await?;
        ledger::reserve_pending(
            tx.as_mut(),
            &leave_type,
            employee_id,
            year,
            &request.business_days,
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "Employee {} requested {} days of {} ({} to {}) as {}",
            employee_id,
            request.business_days,
            leave_type.name,
            request.start_date,
            request.end_date,
            request.id
        );
        self.project(request).await
    }

    pub async fn review(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
        input: ReviewInput,
    ) -> Result<LeaveRequestView, AppError> {
        self.require_employee(reviewer_id).await?;

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| request_not_found(request_id))?;

        if request.status != LeaveRequestStatus::Pending {
            return Err(AppError::Conflict(format!(
                "request {} is already {}",
                request.id, request.status
            )));
        }
        if request.employee_id == reviewer_id {
            return Err(AppError::PermissionDenied(
                "employees cannot review their own requests".into(),
            ));
        }

        let leave_type = self.require_type(request.time_off_type_id).await?;
        let year = request.start_date.year();
        let days = request.business_days.clone();

        ledger::reserve_pending(tx.as_mut(), &leave_type, request.employee_id, year, &-&days)
            .await?;
        request.status = match input.decision {
            ReviewDecision::Approve => {
                ledger::commit_used(tx.as_mut(), &leave_type, request.employee_id, year, &days)
                    .await?;
                LeaveRequestStatus::Approved
            }
            ReviewDecision::Reject => LeaveRequestStatus::Rejected,
        };

        let now = Utc::now();
        request.reviewer_id = Some(reviewer_id);
        request.review_note = input.note;
        request.reviewed_at = Some(now);
        request.updated_at = now;
        tx.update_request(&request).await?;
        tx.commit().await?;

        log::info!(
            "Request {} {} by {}",
            request.id,
            request.status,
            reviewer_id
        );

        if request.status == LeaveRequestStatus::Approved {
            self.sync_approved(&mut request, &leave_type).await;
        }
        self.project(request).await
    }

    pub async fn cancel(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<LeaveRequestView, AppError> {
        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| request_not_found(request_id))?;

        if request.employee_id != caller_id {
            return Err(AppError::PermissionDenied(
                "only the requesting employee can cancel a request".into(),
            ));
        }
        if !request.status.is_open() {
            return Err(AppError::Conflict(format!(
                "request {} is already {}",
                request.id, request.status
            )));
        }

        let leave_type = self.require_type(request.time_off_type_id).await?;
        let year = request.start_date.year();
        let reversal = -&request.business_days;
        let was_approved = request.status == LeaveRequestStatus::Approved;

        if was_approved {
            ledger::commit_used(tx.as_mut(), &leave_type, request.employee_id, year, &reversal)
                .await?;
        } else {
            ledger::reserve_pending(tx.as_mut(), &leave_type, request.employee_id, year, &reversal)
                .await?;
        }

        let event_id = request.calendar_event_id.take();
        request.status = LeaveRequestStatus::Cancelled;
        request.updated_at = Utc::now();
        tx.update_request(&request).await?;
        tx.commit().await?;

        log::info!("Request {} cancelled by {}", request.id, caller_id);

        if let (true, Some(event_id)) = (was_approved, event_id) {
            self.remove_event(request.employee_id, &event_id).await;
        }
        self.project(request).await
    }

    /// Visible to the owner, the owner's direct manager, and holders of the
    /// read-all capability.
    pub async fn get_by_id(
        &self,
        request_id: Uuid,
        caller: &Claims,
    ) -> Result<LeaveRequestView, AppError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| request_not_found(request_id))?;

        let visible = request.employee_id == caller.employee_id()
            || caller.has(capability::REQUEST_READ_ALL)
            || self
                .directory
                .find_employee(request.employee_id)
                .await?
                .is_some_and(|owner| owner.is_direct_report_of(caller.employee_id()));

        if !visible {
            return Err(AppError::PermissionDenied(format!(
                "request {request_id} is not visible to the caller"
            )));
        }
        self.project(request).await
    }

    pub async fn list_mine(&self, employee_id: Uuid) -> Result<Vec<LeaveRequestView>, AppError> {
        self.require_employee(employee_id).await?;
        let requests = self.store.list_requests_for_employee(employee_id).await?;
        self.project_all(requests).await
    }

    pub async fn list_for_team(
        &self,
        manager_id: Uuid,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        self.require_employee(manager_id).await?;
        let requests = self.store.list_requests_for_manager(manager_id).await?;
        self.project_all(requests).await
    }

    pub async fn list_all(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Paged<LeaveRequestView>, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let offset = i64::from(page - 1) * i64::from(per_page);

        let (requests, total) = self
            .store
            .list_requests(offset, i64::from(per_page))
            .await?;
        Ok(Paged {
            items: self.project_all(requests).await?,
            total,
            page,
            per_page,
        })
    }

    /// Approved absences intersecting `[from, to]`, for team calendars.
    pub async fn list_approved_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        if to < from {
            return Err(AppError::Validation("'to' must not be before 'from'".into()));
        }
        let requests = self.store.list_approved_between(from, to).await?;
        self.project_all(requests).await
    }

    async fn sync_approved(&self, request: &mut LeaveRequest, leave_type: &LeaveType) {
        let owner = match self.directory.find_employee(request.employee_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                log::warn!("Owner of request {} vanished; skipping calendar", request.id);
                return;
            }
            Err(e) => {
                log::warn!("Could not load owner of request {}: {}", request.id, e);
                return;
            }
        };

        let entry = CalendarEntry::for_request(request, &owner, &leave_type.name);
        let Some(event_id) = self.calendar.create_event(&entry).await else {
            return;
        };

        match self.attach_event(request.id, &event_id).await {
            Ok(()) => request.calendar_event_id = Some(event_id),
            Err(e) => log::error!(
                "Calendar event {} created but not recorded on request {}: {}",
                event_id,
                request.id,
                e
            ),
        }
    }

    async fn attach_event(&self, request_id: Uuid, event_id: &str) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| request_not_found(request_id))?;

        // A cancel may have slipped in between commit and sync.
        if request.status != LeaveRequestStatus::Approved {
            return Err(AppError::Conflict(format!(
                "request {} is now {}",
                request_id, request.status
            )));
        }

        request.calendar_event_id = Some(event_id.to_string());
        request.updated_at = Utc::now();
        tx.update_request(&request).await?;
        tx.commit().await
    }

    async fn remove_event(&self, employee_id: Uuid, event_id: &str) {
        let identity = match self.directory.find_employee(employee_id).await {
            Ok(owner) => owner.and_then(|o| o.calendar_identity().map(str::to_string)),
            Err(e) => {
                log::warn!("Could not load employee {}: {}", employee_id, e);
                None
            }
        };
        self.calendar
            .delete_event(identity.as_deref(), event_id)
            .await;
    }

    async fn require_employee(&self, id: Uuid) -> Result<(), AppError> {
        match self.directory.find_employee(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("employee {id}"))),
        }
    }

    async fn require_type(&self, id: Uuid) -> Result<LeaveType, AppError> {
        self.store
            .find_type(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("time-off type {id}")))
    }

    async fn project(&self, request: LeaveRequest) -> Result<LeaveRequestView, AppError> {
        let id = request.id;
        self.project_all(vec![request])
            .await?
            .pop()
            .ok_or_else(|| request_not_found(id))
    }

    async fn project_all(
        &self,
        requests: Vec<LeaveRequest>,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        let type_names: HashMap<Uuid, String> = self
            .store
            .list_types(false)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let mut names: HashMap<Uuid, String> = HashMap::new();
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let employee_name = self.employee_name(&mut names, request.employee_id).await?;
            let reviewer_name = match request.reviewer_id {
                Some(id) => Some(self.employee_name(&mut names, id).await?),
                None => None,
            };
            let type_name = type_names
                .get(&request.time_off_type_id)
                .cloned()
                .unwrap_or_default();
            views.push(to_view(request, employee_name, type_name, reviewer_name));
        }
        Ok(views)
    }

    async fn employee_name(
        &self,
        cache: &mut HashMap<Uuid, String>,
        id: Uuid,
    ) -> Result<String, AppError> {
        if let Some(name) = cache.get(&id) {
            return Ok(name.clone());
        }
        let name = self
            .directory
            .find_employee(id)
            .await?
            .map(|e| e.full_name)
            .unwrap_or_default();
        cache.insert(id, name.clone());
        Ok(name)
    }
}

/// Checks the date and half-day rules and returns the effective half-day period.
fn validate_input(input: &LeaveRequestInput) -> Result<Option<HalfDayPeriod>, AppError> {
    if input.end_date < input.start_date {
        return Err(AppError::Validation(
            "endDate must not be before startDate".into(),
        ));
    }

    let period = if input.half_day {
        if input.start_date != input.end_date {
            return Err(AppError::Validation(
                "a half-day request must start and end on the same date".into(),
            ));
        }
        match input.half_day_period {
            Some(period) => Some(period),
            None => {
                return Err(AppError::Validation(
                    "a half-day request needs halfDayPeriod".into(),
                ));
            }
        }
    } else {
        None
    };

    if input
        .reason
        .as_deref()
        .is_some_and(|r| r.chars().count() > MAX_REASON_LEN)
    {
        return Err(AppError::Validation(format!(
            "reason must be at most {MAX_REASON_LEN} characters"
        )));
    }

    Ok(period)
}

/// Whether `existing` blocks a new request over `[start, end]`.
///
/// `period` is the new request's half-day period, if it is a half day.
/// Morning and afternoon of the same single date may coexist; every other
/// intersection is a conflict.
fn is_conflict(
    existing: &LeaveRequest,
    start: NaiveDate,
    end: NaiveDate,
    period: Option<HalfDayPeriod>,
) -> bool {
    if !existing.intersects(start, end) {
        return false;
    }

    let same_single_date =
        start == end && existing.start_date == start && existing.end_date == start;
    let opposite_halves = matches!(
        (existing.half_day, existing.half_day_period, period),
        (true, Some(theirs), Some(ours)) if theirs != ours
    );
    !(same_single_date && opposite_halves)
}

fn to_view(
    request: LeaveRequest,
    employee_name: String,
    time_off_type_name: String,
    reviewer_name: Option<String>,
) -> LeaveRequestView {
    let calendar_synced = request.calendar_event_id.is_some();
    LeaveRequestView {
        id: request.id,
        employee_id: request.employee_id,
        employee_name,
        time_off_type_id: request.time_off_type_id,
        time_off_type_name,
        start_date: request.start_date,
        end_date: request.end_date,
        half_day: request.half_day,
        half_day_period: request.half_day_period,
        business_days: request.business_days,
        reason: request.reason,
        status: request.status,
        reviewer_id: request.reviewer_id,
        reviewer_name,
        review_note: request.review_note,
        reviewed_at: request.reviewed_at,
        created_at: request.created_at,
        calendar_event_id: request.calendar_event_id,
        calendar_synced,
    }
}

fn request_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("time-off request {id}"))
}
