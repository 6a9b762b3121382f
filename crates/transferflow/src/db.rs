use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Pool for the metadata store. Job source/target databases never go through here.
pub async fn make_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let max_connections = std::env::var("TRANSFERFLOW_DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(4)
        .clamp(1, 32);

    let acquire_timeout_secs = std::env::var("TRANSFERFLOW_DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10)
        .clamp(1, 60);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
