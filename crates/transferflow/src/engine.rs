use std::sync::Arc;

use sqlx::PgPool;

use crate::config::EngineConfig;
use crate::jobs::{
    ColumnMapping, ConnectionSpec, JobDefinition, JobListItem, JobsRepo, LogEntry, LogsRepo,
    NewTrigger, SavedConnectionsRepo, SettingsRepo, TransferJob, TriggerEdge,
};
use crate::transfer::{ConnectionResolver, JobRunner, Notifier, RunOutcome, SmtpNotifier};

/// Everything a host needs: authoring, running, and reading back results.
#[derive(Clone)]
pub struct Engine {
    pub jobs: JobsRepo,
    pub logs: LogsRepo,
    pub settings: SettingsRepo,
    pub saved_connections: SavedConnectionsRepo,
    pub runner: JobRunner,
    resolver: ConnectionResolver,
}

impl Engine {
    pub fn new(pool: PgPool, cfg: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        let jobs = JobsRepo::new(pool.clone());
        let logs = LogsRepo::new(pool.clone());
        let runner = JobRunner::new(jobs.clone(), logs.clone(), notifier, cfg.clone());
        Self {
            jobs,
            logs,
            settings: SettingsRepo::new(pool.clone()),
            saved_connections: SavedConnectionsRepo::new(pool),
            runner,
            resolver: ConnectionResolver::new(cfg.connect_timeout),
        }
    }

    /// Failures are mailed using the `smtp_*` settings.
    pub fn with_smtp(pool: PgPool, cfg: EngineConfig) -> Self {
        let notifier = Arc::new(SmtpNotifier::new(SettingsRepo::new(pool.clone())));
        Self::new(pool, cfg, notifier)
    }

    pub async fn create_job(&self, def: &JobDefinition) -> anyhow::Result<i64> {
        let id = self.jobs.create_job(def).await?;
        tracing::info!(job_id = id, name = %def.name, "job created");
        Ok(id)
    }

    pub async fn update_job(&self, job_id: i64, def: &JobDefinition) -> anyhow::Result<bool> {
        self.jobs.update_job(job_id, def).await
    }

    pub async fn delete_job(&self, job_id: i64) -> anyhow::Result<bool> {
        let deleted = self.jobs.delete_job(job_id).await?;
        if deleted {
            tracing::info!(job_id, "job deleted");
        }
        Ok(deleted)
    }

    pub async fn duplicate_job(&self, job_id: i64) -> anyhow::Result<Option<i64>> {
        self.jobs.duplicate_job(job_id).await
    }

    pub async fn add_trigger(&self, job_id: i64, trigger: &NewTrigger) -> anyhow::Result<i64> {
        self.jobs.add_trigger(job_id, trigger).await
    }

    pub async fn run(&self, job_id: i64) -> anyhow::Result<RunOutcome> {
        self.runner.run(job_id).await
    }

    pub async fn list_jobs(&self) -> anyhow::Result<Vec<JobListItem>> {
        self.jobs.list_jobs().await
    }

    pub async fn get_job(&self, job_id: i64) -> anyhow::Result<Option<TransferJob>> {
        self.jobs.get_job(job_id).await
    }

    pub async fn get_job_details(&self, job_id: i64) -> anyhow::Result<Vec<ColumnMapping>> {
        self.jobs.get_job_details(job_id).await
    }

    pub async fn list_triggers(&self, job_id: i64) -> anyhow::Result<Vec<TriggerEdge>> {
        self.jobs.list_triggers(job_id).await
    }

    pub async fn get_logs(&self, job_id: i64) -> anyhow::Result<Vec<LogEntry>> {
        self.logs.list_for_job(job_id).await
    }

    pub async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.settings.get(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.settings.set(key, value).await
    }

    pub async fn probe_connection(&self, spec: &ConnectionSpec) -> anyhow::Result<()> {
        self.resolver.probe(spec).await
    }
}
