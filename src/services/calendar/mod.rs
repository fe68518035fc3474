use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::config::CalendarConfig;
use crate::database::models::{Employee, HalfDayPeriod, LeaveRequest};

pub mod graph;
pub mod simulated;

pub use graph::GraphCalendar;
pub use simulated::SimulatedCalendar;

/// Outbound contract to the external calendar.
///
/// Both calls are best-effort: implementations log their own failures and
/// never report them to the caller.
#[async_trait]
pub trait CalendarSync: Send + Sync {
    /// Returns the provider's event id, or `None` when nothing was created.
    async fn create_event(&self, entry: &CalendarEntry) -> Option<String>;

    async fn delete_event(&self, identity: Option<&str>, event_id: &str);
}

/// When the absence shows on the calendar, in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventWindow {
    /// `end` is exclusive: the day after the last day off.
    AllDay { start: NaiveDate, end: NaiveDate },
    Timed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub request_id: Uuid,
    pub identity: Option<String>,
    pub subject: String,
    pub body: String,
    pub window: EventWindow,
}

impl CalendarEntry {
    pub fn for_request(request: &LeaveRequest, employee: &Employee, type_name: &str) -> Self {
        Self {
            request_id: request.id,
            identity: employee.calendar_identity().map(str::to_string),
            subject: format!("{} - {}", type_name, employee.full_name),
            body: format!(
                "Time off: {}\nDays: {}",
                type_name,
                request.business_days.normalized()
            ),
            window: window_for(request),
        }
    }
}

fn window_for(request: &LeaveRequest) -> EventWindow {
    match (request.half_day, request.half_day_period) {
        (true, Some(period)) => {
            let (from, to) = match period {
                HalfDayPeriod::Morning => (8, 12),
                HalfDayPeriod::Afternoon => (13, 17),
            };
            EventWindow::Timed {
                start: at_hour(request.start_date, from),
                end: at_hour(request.start_date, to),
            }
        }
        _ => EventWindow::AllDay {
            start: request.start_date,
            end: request
                .end_date
                .checked_add_days(Days::new(1))
                .unwrap_or(request.end_date),
        },
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default())
        .and_utc()
}

/// The only place that decides between the live and the simulated calendar.
pub fn from_config(config: &CalendarConfig) -> Result<Arc<dyn CalendarSync>> {
    if config.mock_enabled {
        log::info!("Calendar sync running in simulated mode");
        return Ok(Arc::new(SimulatedCalendar));
    }

    Ok(Arc::new(GraphCalendar::new(config.clone())?))
}
