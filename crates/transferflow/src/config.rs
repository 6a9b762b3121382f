use std::time::Duration;

/// What a check should conclude when its query against a job database fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckErrorPolicy {
    /// Treat the error as "the row is not there".
    AssumeAbsent,
    /// Treat the error as "the row is there".
    AssumePresent,
}

impl CheckErrorPolicy {
    pub fn resolve(self) -> bool {
        matches!(self, CheckErrorPolicy::AssumePresent)
    }
}

/// Engine knobs that do not live in the `settings` table.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub connect_timeout: Duration,
    /// Existence-check failures: default inserts anyway (fail open).
    pub exists_on_error: CheckErrorPolicy,
    /// Trigger-predicate failures: default blocks the run (fail closed).
    pub trigger_on_error: CheckErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            exists_on_error: CheckErrorPolicy::AssumeAbsent,
            trigger_on_error: CheckErrorPolicy::AssumeAbsent,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub migrate_on_startup: bool,
    pub max_retries: i32,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env_or_fallback("TRANSFERFLOW_DATABASE_URL", "DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let migrate_on_startup = env_bool("TRANSFERFLOW_MIGRATE_ON_STARTUP").unwrap_or(true);

        let max_retries = std::env::var("TRANSFERFLOW_MAX_RETRIES")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(3);

        let connect_timeout_secs: u64 = std::env::var("TRANSFERFLOW_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(10)
            .clamp(1, 300);

        let exists_on_error = std::env::var("TRANSFERFLOW_EXISTS_ON_ERROR")
            .ok()
            .and_then(|s| parse_policy(&s))
            .unwrap_or(CheckErrorPolicy::AssumeAbsent);

        let trigger_on_error = std::env::var("TRANSFERFLOW_TRIGGER_ON_ERROR")
            .ok()
            .and_then(|s| parse_policy(&s))
            .unwrap_or(CheckErrorPolicy::AssumeAbsent);

        Ok(Self {
            database_url,
            migrate_on_startup,
            max_retries,
            engine: EngineConfig {
                connect_timeout: Duration::from_secs(connect_timeout_secs),
                exists_on_error,
                trigger_on_error,
            },
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// `absent`/`unsatisfied`/`false` and `present`/`satisfied`/`true` are accepted.
fn parse_policy(value: &str) -> Option<CheckErrorPolicy> {
    match value.trim().to_lowercase().as_str() {
        "absent" | "unsatisfied" | "false" | "closed" => Some(CheckErrorPolicy::AssumeAbsent),
        "present" | "satisfied" | "true" | "open" => Some(CheckErrorPolicy::AssumePresent),
        _ => None,
    }
}
