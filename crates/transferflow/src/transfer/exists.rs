use sqlx::postgres::PgConnection;

use crate::config::CheckErrorPolicy;
use crate::jobs::error_codes::FailureKind;
use crate::transfer::mapping::TargetRow;
use crate::transfer::sql;

/// Idempotency guard: is there already a target row matching every key column?
///
/// The values come from the resolved target row, so fixed values and conversions
/// apply exactly as they will for the insert. A query error is resolved by
/// `on_error` rather than surfaced.
pub async fn row_exists(
    conn: &mut PgConnection,
    table: &str,
    key_columns: &[&str],
    row: &TargetRow,
    on_error: CheckErrorPolicy,
) -> bool {
    if key_columns.is_empty() {
        return false;
    }

    let stmt = sql::row_exists(table, key_columns);
    let keys = row.project(key_columns);

    match sqlx::query_scalar::<_, bool>(&stmt)
        .bind(&keys)
        .fetch_one(&mut *conn)
        .await
    {
        Ok(found) => found,
        Err(e) => {
            let assumed = on_error.resolve();
            tracing::warn!(
                table,
                error = %e,
                assumed,
                "{}",
                FailureKind::ExistenceCheck.describe("key lookup failed")
            );
            assumed
        }
    }
}
