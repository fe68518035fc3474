use async_trait::async_trait;
use uuid::Uuid;

use super::{CalendarEntry, CalendarSync};

/// Stand-in used when no calendar provider is configured. It hands out
/// synthetic event ids so the approval flow behaves the same end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedCalendar;

#[async_trait]
impl CalendarSync for SimulatedCalendar {
    async fn create_event(&self, entry: &CalendarEntry) -> Option<String> {
        let Some(identity) = entry.identity.as_deref() else {
            log::info!(
                "[SIMULATED] No calendar identity for request {}; no event created",
                entry.request_id
            );
            return None;
        };

        let event_id = format!("sim-event-{}", Uuid::new_v4());
        log::info!(
            "[SIMULATED] Created event {} for {} ({:?}): {}",
            event_id,
            identity,
            entry.window,
            entry.subject
        );
        Some(event_id)
    }

    async fn delete_event(&self, identity: Option<&str>, event_id: &str) {
        log::info!(
            "[SIMULATED] Deleted event {} for {}",
            event_id,
            identity.unwrap_or("unknown identity")
        );
    }
}
