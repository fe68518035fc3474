use std::sync::Arc;

use uuid::Uuid;

use crate::database::models::{LeaveType, LeaveTypeInput, LeaveTypeUpdateInput};
use crate::database::store::LeaveStore;
use crate::error::AppError;

const MAX_NAME_LEN: usize = 100;

/// Registry of leave categories. Types are never removed, only deactivated.
#[derive(Clone)]
pub struct LeaveTypeService {
    store: Arc<dyn LeaveStore>,
}

impl LeaveTypeService {
    pub fn new(store: Arc<dyn LeaveStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: LeaveTypeInput) -> Result<LeaveType, AppError> {
        let leave_type = LeaveType::from_input(input);
        validate(&leave_type)?;

        let mut tx = self.store.begin().await?;
        if tx.find_active_type_by_name(&leave_type.name).await?.is_some() {
            return Err(name_taken(&leave_type.name));
        }
        tx.insert_type(&leave_type).await?;
        tx.commit().await?;

        log::info!("Created time-off type {} ({})", leave_type.name, leave_type.id);
        Ok(leave_type)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: LeaveTypeUpdateInput,
    ) -> Result<LeaveType, AppError> {
        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_type(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        let mut updated = current.clone();
        updated.apply(patch);
        validate(&updated)?;

        let renamed = !updated.name_matches(&current.name);
        let reactivated = updated.is_active && !current.is_active;
        if updated.is_active && (renamed || reactivated) {
            if let Some(holder) = tx.find_active_type_by_name(&updated.name).await? {
                if holder.id != id {
                    return Err(name_taken(&updated.name));
                }
            }
        }

        tx.update_type(&updated).await?;
        tx.commit().await?;

        log::info!("Updated time-off type {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> Result<LeaveType, AppError> {
        self.store
            .find_type(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<LeaveType>, AppError> {
        self.store.list_types(active_only).await
    }

    /// Soft delete. Deactivating an inactive type is a no-op.
    pub async fn deactivate(&self, id: Uuid) -> Result<LeaveType, AppError> {
        let mut tx = self.store.begin().await?;
        let mut leave_type = tx
            .lock_type(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        if !leave_type.is_active {
            return Ok(leave_type);
        }

        leave_type.apply(LeaveTypeUpdateInput {
            is_active: Some(false),
            ..Default::default()
        });
        tx.update_type(&leave_type).await?;
        tx.commit().await?;

        log::info!("Deactivated time-off type {} ({})", leave_type.name, leave_type.id);
        Ok(leave_type)
    }
}

fn validate(leave_type: &LeaveType) -> Result<(), AppError> {
    if leave_type.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be blank".into()));
    }
    if leave_type.name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if leave_type.default_days_per_year < 0 {
        return Err(AppError::Validation(
            "defaultDaysPerYear must not be negative".into(),
        ));
    }
    if leave_type.max_carry_over_days < 0 {
        return Err(AppError::Validation(
            "maxCarryOverDays must not be negative".into(),
        ));
    }
    Ok(())
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("time-off type {id}"))
}

fn name_taken(name: &str) -> AppError {
    AppError::Conflict(format!("an active time-off type named '{name}' already exists"))
}
