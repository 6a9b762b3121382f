use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use sqlx::postgres::PgConnection;
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::jobs::error_codes::FailureKind;
use crate::jobs::{JobsRepo, LogsRepo};
use crate::transfer::connect::{close_quietly, ConnectionResolver};
use crate::transfer::exists;
use crate::transfer::locks::RunLocks;
use crate::transfer::mapping;
use crate::transfer::notify::Notifier;
use crate::transfer::sql;
use crate::transfer::unit::{group_units, CopyUnit};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const LOG_BLOCKED: &str = "blocked by trigger: transfer not started";
pub const LOG_ALREADY_RUNNING: &str = "already running: transfer skipped";
pub const LOG_COMPLETED: &str = "transfer completed";

/// How a call to [`JobRunner::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No such job. Nothing was logged.
    Missing,
    /// Another run of the same job is in flight in this process.
    AlreadyRunning,
    /// A trigger edge could not be satisfied.
    Blocked,
    /// Source or target was unreachable; nothing was copied.
    ConnectionFailed(FailureKind),
    Completed(RunReport),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// Only connection failures are worth re-running later.
    pub fn should_retry(&self) -> bool {
        matches!(self, RunOutcome::ConnectionFailed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub job_id: i64,
    pub units: Vec<UnitReport>,
}

impl RunReport {
    pub fn inserted(&self) -> u64 {
        self.units.iter().map(|u| u.inserted).sum()
    }

    pub fn failed(&self) -> u64 {
        self.units.iter().map(|u| u.failed).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitReport {
    pub source_table: String,
    pub target_table: String,
    pub rows_read: u64,
    pub inserted: u64,
    /// Rows whose key already existed in the target.
    pub skipped: u64,
    pub failed: u64,
    pub read_failed: bool,
}

#[derive(Clone)]
pub struct JobRunner {
    pub(super) jobs: JobsRepo,
    pub(super) logs: LogsRepo,
    pub(super) resolver: ConnectionResolver,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) locks: RunLocks,
    pub(super) cfg: EngineConfig,
}

impl JobRunner {
    pub fn new(
        jobs: JobsRepo,
        logs: LogsRepo,
        notifier: Arc<dyn Notifier>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            jobs,
            logs,
            resolver: ConnectionResolver::new(cfg.connect_timeout),
            notifier,
            locks: RunLocks::new(),
            cfg,
        }
    }

    /// Share the in-flight set with other runners.
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    /// Run one job: resolve triggers, copy every unit, stamp `last_run_at`.
    ///
    /// Errors are reserved for the metadata store. Anything that goes wrong
    /// against a job's own databases is logged against the job and reported
    /// through the outcome.
    pub async fn run(&self, job_id: i64) -> anyhow::Result<RunOutcome> {
        self.run_chain(job_id, &[]).await
    }

    pub(super) fn run_chain<'a>(
        &'a self,
        job_id: i64,
        chain: &'a [i64],
    ) -> BoxFuture<'a, anyhow::Result<RunOutcome>> {
        let span = tracing::info_span!("transfer_job", job_id, depth = chain.len());
        Box::pin(
            async move {
                let Some(job) = self.jobs.get_job(job_id).await? else {
                    tracing::debug!("job not found, nothing to do");
                    return Ok(RunOutcome::Missing);
                };

                let Some(_guard) = self.locks.try_acquire(job_id) else {
                    tracing::warn!("job already running");
                    self.logs.append(job_id, LOG_ALREADY_RUNNING).await?;
                    return Ok(RunOutcome::AlreadyRunning);
                };

                let mut path = chain.to_vec();
                path.push(job_id);
                if !self.satisfy_chain(job_id, &path).await? {
                    tracing::info!("blocked by trigger");
                    self.logs.append(job_id, LOG_BLOCKED).await?;
                    return Ok(RunOutcome::Blocked);
                }

                tracing::info!(name = %job.name, "transfer starting");

                let mut source = match self.resolver.open(&job.source).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        let kind = FailureKind::SourceConnection;
                        self.fail(job_id, kind, format!("source connection failed: {e:#}"))
                            .await?;
                        return Ok(RunOutcome::ConnectionFailed(kind));
                    }
                };

                let mut target = match self.resolver.open(&job.target).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        close_quietly(source).await;
                        let kind = FailureKind::TargetConnection;
                        self.fail(job_id, kind, format!("target connection failed: {e:#}"))
                            .await?;
                        return Ok(RunOutcome::ConnectionFailed(kind));
                    }
                };

                let units = group_units(self.jobs.get_job_details(job_id).await?);
                let mut report = RunReport {
                    job_id,
                    units: Vec::with_capacity(units.len()),
                };

                for unit in &units {
                    let unit_report = self
                        .copy_unit(job_id, unit, &mut source, &mut target)
                        .await;
                    match unit_report {
                        Ok(r) => report.units.push(r),
                        Err(e) => {
                            close_quietly(source).await;
                            close_quietly(target).await;
                            return Err(e);
                        }
                    }
                }

                close_quietly(source).await;
                close_quietly(target).await;

                self.jobs.mark_ran(job_id).await?;
                self.logs.append(job_id, LOG_COMPLETED).await?;
                tracing::info!(
                    inserted = report.inserted(),
                    failed = report.failed(),
                    "transfer completed"
                );

                Ok(RunOutcome::Completed(report))
            }
            .instrument(span),
        )
    }

    /// Copy one unit. Read errors end the unit, insert errors end the row; both
    /// are logged and notified. The `Err` path is metadata-store failure only.
    async fn copy_unit(
        &self,
        job_id: i64,
        unit: &CopyUnit,
        source: &mut PgConnection,
        target: &mut PgConnection,
    ) -> anyhow::Result<UnitReport> {
        let mut report = UnitReport {
            source_table: unit.source_table.clone(),
            target_table: unit.target_table.clone(),
            ..UnitReport::default()
        };

        let select = sql::select_rows(&unit.source_table, &unit.source_columns());
        let rows = match sqlx::query_scalar::<_, Value>(&select)
            .fetch_all(&mut *source)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                report.read_failed = true;
                self.fail(
                    job_id,
                    FailureKind::SourceRead,
                    format!("{}: read failed: {e}", unit.source_table),
                )
                .await?;
                return Ok(report);
            }
        };
        report.rows_read = rows.len() as u64;

        let key_columns = unit.key_columns();
        let mut target_columns: Vec<&str> = Vec::with_capacity(unit.mappings.len());
        for m in &unit.mappings {
            if !target_columns.contains(&m.target_column.as_str()) {
                target_columns.push(&m.target_column);
            }
        }
        let insert = sql::insert_row(&unit.target_table, &target_columns);

        for (idx, raw) in rows.into_iter().enumerate() {
            let source_row = match raw {
                Value::Object(obj) => obj,
                _ => Map::new(),
            };
            let row = mapping::build_target_row(&unit.mappings, &source_row);

            if unit.is_idempotent()
                && exists::row_exists(
                    target,
                    &unit.target_table,
                    &key_columns,
                    &row,
                    self.cfg.exists_on_error,
                )
                .await
            {
                report.skipped += 1;
                continue;
            }

            match sqlx::query(&insert)
                .bind(row.to_json())
                .execute(&mut *target)
                .await
            {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    report.failed += 1;
                    self.fail(
                        job_id,
                        FailureKind::RowInsert,
                        format!(
                            "{}: insert of source row {} failed: {e}",
                            unit.target_table,
                            idx + 1
                        ),
                    )
                    .await?;
                }
            }
        }

        self.logs
            .append(
                job_id,
                &format!("{}: {} rows inserted", unit.label(), report.inserted),
            )
            .await?;
        tracing::info!(
            unit = %unit.label(),
            read = report.rows_read,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "unit copied"
        );

        Ok(report)
    }

    /// Persist the failure against the job and pass it to the notifier.
    async fn fail(&self, job_id: i64, kind: FailureKind, detail: String) -> anyhow::Result<()> {
        let message = kind.describe(detail);
        tracing::error!(%kind, "{message}");
        self.logs.append(job_id, &message).await?;
        if kind.notifies() {
            self.notifier.notify(&format!("job {job_id}: {message}")).await;
        }
        Ok(())
    }
}
