use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a directory employee the time-off engine reads.
///
/// The manager link is a plain id, never an embedded employee, so the
/// hierarchy can be walked exactly one hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub reports_to: Option<Uuid>,
    /// Identity of the employee's mailbox at the calendar provider.
    pub calendar_identity: Option<String>,
}

impl Employee {
    pub fn is_direct_report_of(&self, manager_id: Uuid) -> bool {
        self.reports_to == Some(manager_id)
    }

    pub fn calendar_identity(&self) -> Option<&str> {
        self.calendar_identity
            .as_deref()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
    }
}
