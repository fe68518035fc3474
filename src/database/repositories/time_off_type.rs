use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::{models::LeaveType, utils::sql};

const COLUMNS: &str = r#"
    id,
    name,
    description,
    default_days_per_year,
    carry_over_allowed,
    max_carry_over_days,
    requires_approval,
    is_unlimited,
    is_active,
    created_at,
    updated_at
"#;

pub async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>(&sql(&format!(
        "SELECT {COLUMNS} FROM time_off_types WHERE id = ?"
    )))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn lock_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>(&sql(&format!(
        "SELECT {COLUMNS} FROM time_off_types WHERE id = ? FOR UPDATE"
    )))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn find_active_by_name<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
) -> Result<Option<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_types
        WHERE LOWER(name) = LOWER(?) AND is_active
        "#
    )))
    .bind(name.trim())
    .fetch_optional(executor)
    .await
}

pub async fn list<'e>(
    executor: impl PgExecutor<'e>,
    active_only: bool,
) -> Result<Vec<LeaveType>, sqlx::Error> {
    sqlx::query_as::<_, LeaveType>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_types
        WHERE is_active OR NOT ?
        ORDER BY name ASC
        "#
    )))
    .bind(active_only)
    .fetch_all(executor)
    .await
}

pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    leave_type: &LeaveType,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        INSERT INTO
            time_off_types (
                id,
                name,
                description,
                default_days_per_year,
                carry_over_allowed,
                max_carry_over_days,
                requires_approval,
                is_unlimited,
                is_active,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#))
    .bind(leave_type.id)
    .bind(&leave_type.name)
    .bind(&leave_type.description)
    .bind(leave_type.default_days_per_year)
    .bind(leave_type.carry_over_allowed)
    .bind(leave_type.max_carry_over_days)
    .bind(leave_type.requires_approval)
    .bind(leave_type.is_unlimited)
    .bind(leave_type.is_active)
    .bind(leave_type.created_at)
    .bind(leave_type.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn update<'e>(
    executor: impl PgExecutor<'e>,
    leave_type: &LeaveType,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        UPDATE
            time_off_types
        SET
            name = ?,
            description = ?,
            default_days_per_year = ?,
            carry_over_allowed = ?,
            max_carry_over_days = ?,
            requires_approval = ?,
            is_unlimited = ?,
            is_active = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(&leave_type.name)
    .bind(&leave_type.description)
    .bind(leave_type.default_days_per_year)
    .bind(leave_type.carry_over_allowed)
    .bind(leave_type.max_carry_over_days)
    .bind(leave_type.requires_approval)
    .bind(leave_type.is_unlimited)
    .bind(leave_type.is_active)
    .bind(leave_type.updated_at)
    .bind(leave_type.id)
    .execute(executor)
    .await?;

    Ok(())
}
