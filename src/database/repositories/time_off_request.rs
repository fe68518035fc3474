use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::{models::LeaveRequest, utils::sql};

const COLUMNS: &str = r#"
    r.id,
    r.employee_id,
    r.time_off_type_id,
    r.start_date,
    r.end_date,
    r.half_day,
    r.half_day_period,
    r.business_days,
    r.reason,
    r.status,
    r.reviewer_id,
    r.review_note,
    r.reviewed_at,
    r.calendar_event_id,
    r.created_at,
    r.updated_at
"#;

pub async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        "SELECT {COLUMNS} FROM time_off_requests r WHERE r.id = ?"
    )))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn lock_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        "SELECT {COLUMNS} FROM time_off_requests r WHERE r.id = ? FOR UPDATE"
    )))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Pending or approved requests of the employee whose dates intersect the range
pub async fn find_open_overlapping<'e>(
    executor: impl PgExecutor<'e>,
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_requests r
        WHERE r.employee_id = ?
            AND r.status IN ('pending', 'approved')
            AND r.start_date <= ?
            AND r.end_date >= ?
        "#
    )))
    .bind(employee_id)
    .bind(end)
    .bind(start)
    .fetch_all(executor)
    .await
}

pub async fn list_for_employee<'e>(
    executor: impl PgExecutor<'e>,
    employee_id: Uuid,
) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_requests r
        WHERE r.employee_id = ?
        ORDER BY r.created_at DESC
        "#
    )))
    .bind(employee_id)
    .fetch_all(executor)
    .await
}

/// Requests of the manager's direct reports
pub async fn list_for_manager<'e>(
    executor: impl PgExecutor<'e>,
    manager_id: Uuid,
) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_requests r
            INNER JOIN employees e ON e.id = r.employee_id
        WHERE e.reports_to = ?
        ORDER BY r.created_at DESC
        "#
    )))
    .bind(manager_id)
    .fetch_all(executor)
    .await
}

pub async fn list_page<'e>(
    executor: impl PgExecutor<'e>,
    offset: i64,
    limit: i64,
) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_requests r
        ORDER BY r.created_at DESC
        LIMIT ? OFFSET ?
        "#
    )))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count<'e>(executor: impl PgExecutor<'e>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM time_off_requests")
        .fetch_one(executor)
        .await
}

/// Approved requests intersecting the range, ordered by type name then employee name
pub async fn list_approved_between<'e>(
    executor: impl PgExecutor<'e>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&sql(&format!(
        r#"
        SELECT {COLUMNS}
        FROM time_off_requests r
            INNER JOIN time_off_types t ON t.id = r.time_off_type_id
            INNER JOIN employees e ON e.id = r.employee_id
        WHERE r.status = 'approved'
            AND r.start_date <= ?
            AND r.end_date >= ?
        ORDER BY t.name ASC, e.full_name ASC, r.start_date ASC
        "#
    )))
    .bind(to)
    .bind(from)
    .fetch_all(executor)
    .await
}

pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    request: &LeaveRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        INSERT INTO
            time_off_requests (
                id,
                employee_id,
                time_off_type_id,
                start_date,
                end_date,
                half_day,
                half_day_period,
                business_days,
                reason,
                status,
                reviewer_id,
                review_note,
                reviewed_at,
                calendar_event_id,
                created_at,
                updated_at
            )
        VALUES
            (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#))
    .bind(request.id)
    .bind(request.employee_id)
    .bind(request.time_off_type_id)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.half_day)
    .bind(request.half_day_period)
    .bind(&request.business_days)
    .bind(&request.reason)
    .bind(request.status)
    .bind(request.reviewer_id)
    .bind(&request.review_note)
    .bind(request.reviewed_at)
    .bind(&request.calendar_event_id)
    .bind(request.created_at)
    .bind(request.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist the mutable part of a request: its lifecycle and calendar link
pub async fn update<'e>(
    executor: impl PgExecutor<'e>,
    request: &LeaveRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(&sql(r#"
        UPDATE
            time_off_requests
        SET
            status = ?,
            reviewer_id = ?,
            review_note = ?,
            reviewed_at = ?,
            calendar_event_id = ?,
            updated_at = ?
        WHERE
            id = ?
    "#))
    .bind(request.status)
    .bind(request.reviewer_id)
    .bind(&request.review_note)
    .bind(request.reviewed_at)
    .bind(&request.calendar_event_id)
    .bind(request.updated_at)
    .bind(request.id)
    .execute(executor)
    .await?;

    Ok(())
}
