use crate::jobs::model::LogEntry;
use sqlx::PgPool;

/// Append-only job log. Rows only disappear with their job.
#[derive(Clone)]
pub struct LogsRepo {
    pool: PgPool,
}

impl LogsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, job_id: i64, message: &str) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transfer_logs (job_id, log_message)
            VALUES ($1, $2)
            RETURNING log_id
            "#,
        )
        .bind(job_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Oldest first.
    pub async fn list_for_job(&self, job_id: i64) -> anyhow::Result<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT log_id, job_id, logged_at, log_message
            FROM transfer_logs
            WHERE job_id = $1
            ORDER BY log_id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
