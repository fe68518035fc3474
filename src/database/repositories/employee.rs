use sqlx::PgExecutor;
use uuid::Uuid;

use crate::database::{models::Employee, utils::sql};

pub async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&sql(r#"
        SELECT
            id,
            full_name,
            email,
            reports_to,
            calendar_identity
        FROM
            employees
        WHERE
            id = ?
    "#))
    .bind(id)
    .fetch_optional(executor)
    .await
}
