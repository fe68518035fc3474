use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaveType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub default_days_per_year: i32,
    pub carry_over_allowed: bool,
    pub max_carry_over_days: i32,
    pub requires_approval: bool,
    /// Exempts the type from every balance-sufficiency check.
    pub is_unlimited: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTypeInput {
    pub name: String,
    pub description: Option<String>,
    pub default_days_per_year: i32,
    pub carry_over_allowed: Option<bool>,
    pub max_carry_over_days: Option<i32>,
    pub requires_approval: Option<bool>,
    pub is_unlimited: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTypeUpdateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_days_per_year: Option<i32>,
    pub carry_over_allowed: Option<bool>,
    pub max_carry_over_days: Option<i32>,
    pub requires_approval: Option<bool>,
    pub is_unlimited: Option<bool>,
    pub is_active: Option<bool>,
}

impl LeaveType {
    pub fn from_input(input: LeaveTypeInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            default_days_per_year: input.default_days_per_year,
            carry_over_allowed: input.carry_over_allowed.unwrap_or(false),
            max_carry_over_days: input.max_carry_over_days.unwrap_or(0),
            requires_approval: input.requires_approval.unwrap_or(true),
            is_unlimited: input.is_unlimited.unwrap_or(false),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: LeaveTypeUpdateInput) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(days) = update.default_days_per_year {
            self.default_days_per_year = days;
        }
        if let Some(allowed) = update.carry_over_allowed {
            self.carry_over_allowed = allowed;
        }
        if let Some(max) = update.max_carry_over_days {
            self.max_carry_over_days = max;
        }
        if let Some(requires) = update.requires_approval {
            self.requires_approval = requires;
        }
        if let Some(unlimited) = update.is_unlimited {
            self.is_unlimited = unlimited;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    pub fn name_matches(&self, other: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(other.trim())
    }
}
