use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::{
    models::{Balance, BalanceKey},
    utils::sql,
};

const COLUMNS: &str = r#"
    id,
    employee_id,
    time_off_type_id,
    year,
    total_allocated,
    used,
    pending,
    carry_over,
    created_at,
    updated_at
"#;

/// Get the balance row for an employee, type and year
pub async fn find_by_key<'e>(
    executor: impl PgExecutor<'e>,
    key: BalanceKey,
) -> Result<Option<Balance>, sqlx::Error> {
    sqlx::query_as::<_, Balance>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_balances
        WHERE employee_id = ? AND time_off_type_id = ? AND year = ?
        "#
    )))
    .bind(key.employee_id)
    .bind(key.leave_type_id)
    .bind(key.year)
    .fetch_optional(executor)
    .await
}

/// Same as [`find_by_key`] but holds the row lock until the transaction ends
pub async fn lock_by_key<'e>(
    executor: impl PgExecutor<'e>,
    key: BalanceKey,
) -> Result<Option<Balance>, sqlx::Error> {
    sqlx::query_as::<_, Balance>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_balances
        WHERE employee_id = ? AND time_off_type_id = ? AND year = ?
        FOR UPDATE
        "#
    )))
    .bind(key.employee_id)
    .bind(key.leave_type_id)
    .bind(key.year)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_employee<'e>(
    executor: impl PgExecutor<'e>,
    employee_id: Uuid,
    year: i32,
) -> Result<Vec<Balance>, sqlx::Error> {
    sqlx::query_as::<_, Balance>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_balances
        WHERE employee_id = ? AND year = ?
        "#
    )))
    .bind(employee_id)
    .bind(year)
    .fetch_all(executor)
    .await
}

/// Insert a fresh row; a concurrent insert of the same key wins silently
pub async fn insert_if_absent<'e>(
    executor: impl PgExecutor<'e>,
    balance: &Balance,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        INSERT INTO
            time_off_balances (
                id,
                employee_id,
                time_off_type_id,
                year,
                total_allocated,
                used,
                pending,
                carry_over,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (employee_id, time_off_type_id, year) DO NOTHING
    "#))
    .bind(balance.id)
    .bind(balance.employee_id)
    .bind(balance.time_off_type_id)
    .bind(balance.year)
    .bind(&balance.total_allocated)
    .bind(&balance.used)
    .bind(&balance.pending)
    .bind(&balance.carry_over)
    .bind(balance.created_at)
    .bind(balance.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn update<'e>(
    executor: impl PgExecutor<'e>,
    balance: &Balance,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        UPDATE
            time_off_balances
        SET
            total_allocated = ?,
            used = ?,
            pending = ?,
            carry_over = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(&balance.total_allocated)
    .bind(&balance.used)
    .bind(&balance.pending)
    .bind(&balance.carry_over)
    .bind(balance.updated_at)
    .bind(balance.id)
    .execute(executor)
    .await?;

    Ok(())
}
