//! Auto-start, interval batches and retries of runs that could not connect.
//!
//! The caller supplies `now` on every call; nothing here reads the clock.
//! Metadata-store errors are logged and the scheduler carries on.

use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tokio::time::Instant;

use crate::jobs::retry::{next_delay_seconds, RetryConfig};
use crate::jobs::settings::DEFAULT_ERROR_RETRY_SECONDS;
use crate::transfer::RunOutcome;
use crate::Engine;

/// Polling intervals are capped at one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRetry {
    pub job_id: i64,
    /// 1 for the first retry after the failed run.
    pub attempt_no: i32,
    pub due: Instant,
}

/// At most one waiting retry per job.
#[derive(Debug, Default)]
pub struct RetryQueue {
    pending: Vec<PendingRetry>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, job_id: i64) -> bool {
        self.pending.iter().any(|r| r.job_id == job_id)
    }

    /// Returns false, leaving the queue untouched, if the job already waits.
    pub fn schedule(&mut self, job_id: i64, attempt_no: i32, due: Instant) -> bool {
        if self.contains(job_id) {
            return false;
        }
        self.pending.push(PendingRetry {
            job_id,
            attempt_no,
            due,
        });
        true
    }

    /// Remove and return every retry due at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingRetry> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|r| r.due <= now);
        self.pending = waiting;
        due
    }

    pub fn get(&self, job_id: i64) -> Option<&PendingRetry> {
        self.pending.iter().find(|r| r.job_id == job_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The outcome is not retried.
    Done,
    Retry { attempt_no: i32 },
    GiveUp,
}

/// `attempt_no` is 0 for a scheduled run and the retry number afterwards.
/// Only connection failures are retried, at most `max_retries` times.
pub fn decide_retry(outcome: &RunOutcome, attempt_no: i32, max_retries: i32) -> RetryDecision {
    if !outcome.should_retry() {
        return RetryDecision::Done;
    }
    if attempt_no < max_retries {
        RetryDecision::Retry {
            attempt_no: attempt_no + 1,
        }
    } else {
        RetryDecision::GiveUp
    }
}

/// Deadline of the next interval batch. Zero disables polling; an armed
/// deadline is kept until it fires.
pub fn next_batch_due(interval_secs: u64, armed: Option<Instant>, now: Instant) -> Option<Instant> {
    if interval_secs == 0 {
        return None;
    }
    armed.or_else(|| deadline(now, interval_secs))
}

fn deadline(now: Instant, secs: u64) -> Option<Instant> {
    now.checked_add(Duration::from_secs(secs.min(MAX_INTERVAL_SECS)))
}

pub struct Scheduler {
    engine: Engine,
    max_retries: i32,
    rng: StdRng,
    next_batch_at: Option<Instant>,
    retries: RetryQueue,
}

impl Scheduler {
    pub fn new(engine: Engine, max_retries: i32) -> Self {
        Self {
            engine,
            max_retries,
            rng: StdRng::from_entropy(),
            next_batch_at: None,
            retries: RetryQueue::new(),
        }
    }

    /// Deterministic jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn retries(&self) -> &RetryQueue {
        &self.retries
    }

    pub fn next_batch_at(&self) -> Option<Instant> {
        self.next_batch_at
    }

    /// Run the `auto_start_jobs` list once if `auto_start_transfers` is on.
    pub async fn start(&mut self, now: Instant) {
        match self.engine.settings.auto_start_enabled().await {
            Ok(true) => self.run_batch(now).await,
            Ok(false) => tracing::info!("auto-start disabled"),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "reading auto-start setting failed")
            }
        }
    }

    /// One scheduler step: the interval batch if due, then due retries.
    /// Settings are read on every call.
    pub async fn tick(&mut self, now: Instant) {
        match self.engine.settings.auto_transfer_interval().await {
            Ok(interval) => {
                self.next_batch_at = next_batch_due(interval, self.next_batch_at, now);
                if matches!(self.next_batch_at, Some(at) if now >= at) {
                    self.run_batch(now).await;
                    self.next_batch_at = deadline(now, interval);
                }
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "reading polling interval failed")
            }
        }

        for retry in self.retries.take_due(now) {
            tracing::info!(
                job_id = retry.job_id,
                attempt_no = retry.attempt_no,
                "retrying job"
            );
            if let Some(outcome) = self.run_job(retry.job_id).await {
                self.follow_up(retry.job_id, retry.attempt_no, &outcome, now)
                    .await;
            }
        }
    }

    async fn run_batch(&mut self, now: Instant) {
        let job_ids = match self.engine.settings.auto_start_jobs().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "reading auto-start jobs failed");
                return;
            }
        };
        tracing::info!(jobs = ?job_ids, "running scheduled batch");

        for job_id in job_ids {
            let Some(outcome) = self.run_job(job_id).await else {
                continue;
            };
            if !self.retries.contains(job_id) {
                self.follow_up(job_id, 0, &outcome, now).await;
            }
        }
    }

    async fn run_job(&self, job_id: i64) -> Option<RunOutcome> {
        match self.engine.run(job_id).await {
            Ok(outcome) => {
                log_outcome(job_id, &outcome);
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(job_id, error = %format!("{e:#}"), "run failed in the metadata store");
                None
            }
        }
    }

    async fn follow_up(&mut self, job_id: i64, attempt_no: i32, outcome: &RunOutcome, now: Instant) {
        let next = match decide_retry(outcome, attempt_no, self.max_retries) {
            RetryDecision::Done => return,
            RetryDecision::GiveUp => {
                tracing::warn!(job_id, attempts = attempt_no, "giving up on retries");
                return;
            }
            RetryDecision::Retry { attempt_no } => attempt_no,
        };

        let base = match self.engine.settings.error_retry_seconds().await {
            Ok(secs) => secs,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "reading retry delay failed");
                DEFAULT_ERROR_RETRY_SECONDS
            }
        };
        let cfg = RetryConfig::from_error_retry_seconds(base);
        let delay = next_delay_seconds(next, &cfg, &mut self.rng);

        let Some(due) = deadline(now, delay.max(0) as u64) else {
            tracing::warn!(job_id, delay_secs = delay, "retry delay out of range, not retrying");
            return;
        };
        if self.retries.schedule(job_id, next, due) {
            tracing::info!(job_id, attempt_no = next, delay_secs = delay, "retry scheduled");
        }
    }
}

fn log_outcome(job_id: i64, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(report) => tracing::info!(
            job_id,
            inserted = report.inserted(),
            failed = report.failed(),
            "job completed"
        ),
        RunOutcome::Missing => tracing::warn!(job_id, "job not found"),
        RunOutcome::AlreadyRunning => tracing::warn!(job_id, "job already running"),
        RunOutcome::Blocked => tracing::warn!(job_id, "job blocked by trigger"),
        RunOutcome::ConnectionFailed(kind) => {
            tracing::error!(job_id, %kind, "job could not connect")
        }
    }
}
