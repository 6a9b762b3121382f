use transferflow::config;
use transferflow::db;
use transferflow::schedule::Scheduler;
use transferflow::Engine;

use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::Config::from_env()?;

    info!(
        migrate_on_startup = cfg.migrate_on_startup,
        max_retries = cfg.max_retries,
        connect_timeout_secs = cfg.engine.connect_timeout.as_secs(),
        exists_on_error = ?cfg.engine.exists_on_error,
        trigger_on_error = ?cfg.engine.trigger_on_error,
        "transferflow scheduler starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let engine = Engine::with_smtp(pool, cfg.engine.clone());
    let mut scheduler = Scheduler::new(engine, cfg.max_retries);

    scheduler.start(Instant::now()).await;

    let run = async {
        loop {
            scheduler.tick(Instant::now()).await;
            tokio::time::sleep(TICK).await;
        }
    };

    tokio::select! {
        _ = run => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    Ok(())
}
