use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one ledger row and the unit of lock serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceKey {
    pub employee_id: Uuid,
    pub leave_type_id: Uuid,
    pub year: i32,
}

impl BalanceKey {
    pub fn new(employee_id: Uuid, leave_type_id: Uuid, year: i32) -> Self {
        Self {
            employee_id,
            leave_type_id,
            year,
        }
    }
}

impl std::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.employee_id, self.leave_type_id, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Balance {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub time_off_type_id: Uuid,
    pub year: i32,
    pub total_allocated: BigDecimal,
    pub used: BigDecimal,
    pub pending: BigDecimal,
    pub carry_over: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// A fresh row with the given allocation and nothing used, pending or carried.
    pub fn opening(key: BalanceKey, total_allocated: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            employee_id: key.employee_id,
            time_off_type_id: key.leave_type_id,
            year: key.year,
            total_allocated,
            used: BigDecimal::from(0),
            pending: BigDecimal::from(0),
            carry_over: BigDecimal::from(0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id, self.time_off_type_id, self.year)
    }

    /// allocated + carry-over - used - pending, computed on every call.
    pub fn remaining(&self) -> BigDecimal {
        &self.total_allocated + &self.carry_over - &self.used - &self.pending
    }
}

/// Flattened balance returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub time_off_type_id: Uuid,
    pub time_off_type_name: String,
    pub year: i32,
    pub total_allocated: BigDecimal,
    pub used: BigDecimal,
    pub pending: BigDecimal,
    pub carry_over: BigDecimal,
    pub remaining: BigDecimal,
    pub is_unlimited: bool,
}

impl BalanceView {
    pub fn new(balance: &Balance, type_name: &str, is_unlimited: bool) -> Self {
        Self {
            id: balance.id,
            employee_id: balance.employee_id,
            time_off_type_id: balance.time_off_type_id,
            time_off_type_name: type_name.to_string(),
            year: balance.year,
            total_allocated: balance.total_allocated.clone(),
            used: balance.used.clone(),
            pending: balance.pending.clone(),
            carry_over: balance.carry_over.clone(),
            remaining: balance.remaining(),
            is_unlimited,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAdjustmentInput {
    pub adjustment: BigDecimal,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn remaining_is_allocation_plus_carry_over_minus_used_and_pending() {
        let key = BalanceKey::new(Uuid::new_v4(), Uuid::new_v4(), 2025);
        let mut balance = Balance::opening(key, BigDecimal::from(20));
        balance.carry_over = BigDecimal::from(3);
        balance.used = BigDecimal::from(5);
        balance.pending = BigDecimal::new(25.into(), 1);

        assert_eq!(balance.remaining(), BigDecimal::new(155.into(), 1));
        assert_eq!(balance.key(), key);
    }
}
