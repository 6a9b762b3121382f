// crates/transferflow/src/jobs/repo.rs

use crate::jobs::model::{
    ColumnMapping, ConnectionSpec, JobDefinition, JobListItem, NewTrigger, TransferJob,
    TriggerEdge,
};
use sqlx::{PgPool, Postgres, Transaction};

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Authoring
    // ----------------------------

    /// Insert the job, its mappings and its triggers in one transaction.
    pub async fn create_job(&self, def: &JobDefinition) -> anyhow::Result<i64> {
        let mut tx = self.pool.begin().await?;

        let job_id = insert_job_row(&mut tx, &def.name, &def.source, &def.target).await?;
        insert_mappings(&mut tx, job_id, &def.mappings).await?;
        insert_triggers(&mut tx, job_id, &def.triggers).await?;

        tx.commit().await?;
        Ok(job_id)
    }

    /// Overwrite connection fields and replace mappings and outgoing triggers.
    /// Returns false when the job does not exist.
    pub async fn update_job(&self, job_id: i64, def: &JobDefinition) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE transfer_jobs
            SET job_name = $2,
                source_server = $3, source_port = $4, source_user = $5,
                source_password = $6, source_db = $7,
                target_server = $8, target_port = $9, target_user = $10,
                target_password = $11, target_db = $12
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(&def.name)
        .bind(&def.source.server)
        .bind(def.source.port)
        .bind(&def.source.user)
        .bind(&def.source.secret)
        .bind(&def.source.database)
        .bind(&def.target.server)
        .bind(def.target.port)
        .bind(&def.target.user)
        .bind(&def.target.secret)
        .bind(&def.target.database)
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM transfer_job_details WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM transfer_triggers WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        insert_mappings(&mut tx, job_id, &def.mappings).await?;
        insert_triggers(&mut tx, job_id, &def.triggers).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Mappings, triggers (either direction) and logs go with the job via FK cascade.
    pub async fn delete_job(&self, job_id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM transfer_jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Deep copy of a job with its mappings and outgoing triggers.
    /// The copy starts with a fresh `created_at` and no `last_run_at`.
    pub async fn duplicate_job(&self, job_id: i64) -> anyhow::Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let Some(job) = sqlx::query_as::<_, TransferJob>(
            "SELECT * FROM transfer_jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let name = format!("{} (copy)", job.name);
        let new_id = insert_job_row(&mut tx, &name, &job.source, &job.target).await?;

        sqlx::query(
            r#"
            INSERT INTO transfer_job_details (
                job_id, source_table, target_table, source_column, target_column,
                fixed_value, convert_type, is_key
            )
            SELECT $2, source_table, target_table, source_column, target_column,
                   fixed_value, convert_type, is_key
            FROM transfer_job_details
            WHERE job_id = $1
            ORDER BY detail_id
            "#,
        )
        .bind(job_id)
        .bind(new_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO transfer_triggers (
                job_id, dependent_job_id, check_table, check_column, check_value
            )
            SELECT $2, dependent_job_id, check_table, check_column, check_value
            FROM transfer_triggers
            WHERE job_id = $1
            ORDER BY trigger_id
            "#,
        )
        .bind(job_id)
        .bind(new_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(new_id))
    }

    pub async fn add_trigger(&self, job_id: i64, trigger: &NewTrigger) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transfer_triggers (
                job_id, dependent_job_id, check_table, check_column, check_value
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING trigger_id
            "#,
        )
        .bind(job_id)
        .bind(trigger.dependent_job_id)
        .bind(&trigger.check_table)
        .bind(&trigger.check_column)
        .bind(&trigger.check_value)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<TransferJob>> {
        let job = sqlx::query_as::<_, TransferJob>("SELECT * FROM transfer_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Newest first.
    pub async fn list_jobs(&self) -> anyhow::Result<Vec<JobListItem>> {
        let rows = sqlx::query_as::<_, JobListItem>(
            r#"
            SELECT job_id, job_name, last_run_at
            FROM transfer_jobs
            ORDER BY job_id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Column mappings in insertion order.
    pub async fn get_job_details(&self, job_id: i64) -> anyhow::Result<Vec<ColumnMapping>> {
        let rows = sqlx::query_as::<_, ColumnMapping>(
            r#"
            SELECT source_table, target_table, source_column, target_column,
                   fixed_value, convert_type, is_key
            FROM transfer_job_details
            WHERE job_id = $1
            ORDER BY detail_id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Outgoing edges of `job_id`, in insertion order.
    pub async fn list_triggers(&self, job_id: i64) -> anyhow::Result<Vec<TriggerEdge>> {
        let rows = sqlx::query_as::<_, TriggerEdge>(
            r#"
            SELECT trigger_id, job_id, dependent_job_id, check_table, check_column, check_value
            FROM transfer_triggers
            WHERE job_id = $1
            ORDER BY trigger_id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ----------------------------
    // Run bookkeeping
    // ----------------------------

    pub async fn mark_ran(&self, job_id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE transfer_jobs SET last_run_at = now() WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn insert_job_row(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    source: &ConnectionSpec,
    target: &ConnectionSpec,
) -> anyhow::Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO transfer_jobs (
            job_name,
            source_server, source_port, source_user, source_password, source_db,
            target_server, target_port, target_user, target_password, target_db
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING job_id
        "#,
    )
    .bind(name)
    .bind(&source.server)
    .bind(source.port)
    .bind(&source.user)
    .bind(&source.secret)
    .bind(&source.database)
    .bind(&target.server)
    .bind(target.port)
    .bind(&target.user)
    .bind(&target.secret)
    .bind(&target.database)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

async fn insert_mappings(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
    mappings: &[ColumnMapping],
) -> anyhow::Result<()> {
    for m in mappings {
        sqlx::query(
            r#"
            INSERT INTO transfer_job_details (
                job_id, source_table, target_table, source_column, target_column,
                fixed_value, convert_type, is_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job_id)
        .bind(&m.source_table)
        .bind(&m.target_table)
        .bind(&m.source_column)
        .bind(&m.target_column)
        .bind(&m.fixed_value)
        .bind(m.convert_type.as_db())
        .bind(m.is_key)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_triggers(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
    triggers: &[NewTrigger],
) -> anyhow::Result<()> {
    for t in triggers {
        sqlx::query(
            r#"
            INSERT INTO transfer_triggers (
                job_id, dependent_job_id, check_table, check_column, check_value
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job_id)
        .bind(t.dependent_job_id)
        .bind(&t.check_table)
        .bind(&t.check_column)
        .bind(&t.check_value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
