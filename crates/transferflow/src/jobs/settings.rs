use sqlx::PgPool;

pub const SMTP_SERVER: &str = "smtp_server";
pub const SMTP_PORT: &str = "smtp_port";
pub const SMTP_USER: &str = "smtp_user";
pub const SMTP_PASS: &str = "smtp_pass";
pub const SMTP_TO: &str = "smtp_to";
pub const AUTO_START_TRANSFERS: &str = "auto_start_transfers";
pub const AUTO_START_JOBS: &str = "auto_start_jobs";
pub const ERROR_RETRY_SECONDS: &str = "error_retry_seconds";
pub const AUTO_TRANSFER_INTERVAL: &str = "auto_transfer_interval";

pub const DEFAULT_ERROR_RETRY_SECONDS: i64 = 60;

/// Flat key/value settings. Every read goes to the database.
#[derive(Clone)]
pub struct SettingsRepo {
    pool: PgPool,
}

impl SettingsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = sqlx::query_scalar::<_, Option<String>>(
            "SELECT setting_value FROM settings WHERE setting_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.flatten())
    }

    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (setting_key, setting_value)
            VALUES ($1, $2)
            ON CONFLICT (setting_key) DO UPDATE SET setting_value = EXCLUDED.setting_value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn auto_start_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.get(AUTO_START_TRANSFERS).await?.as_deref().map(str::trim) == Some("1"))
    }

    pub async fn auto_start_jobs(&self) -> anyhow::Result<Vec<i64>> {
        Ok(parse_job_list(self.get(AUTO_START_JOBS).await?.as_deref().unwrap_or("")))
    }

    /// Polling interval in seconds; zero (or garbage) disables polling.
    pub async fn auto_transfer_interval(&self) -> anyhow::Result<u64> {
        Ok(self
            .get(AUTO_TRANSFER_INTERVAL)
            .await?
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0))
    }

    pub async fn error_retry_seconds(&self) -> anyhow::Result<i64> {
        Ok(self
            .get(ERROR_RETRY_SECONDS)
            .await?
            .and_then(|s| s.trim().parse().ok())
            .filter(|v: &i64| *v >= 0)
            .unwrap_or(DEFAULT_ERROR_RETRY_SECONDS))
    }
}

/// Comma-separated job ids; entries that are not plain digits are skipped.
pub fn parse_job_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect()
}
