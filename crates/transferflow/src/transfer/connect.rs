use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};

use crate::jobs::model::ConnectionSpec;

const DEFAULT_PORT: u16 = 5432;

/// Opens one unpooled connection per request. Each run owns and closes its own.
#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    timeout: Duration,
}

impl ConnectionResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn options(spec: &ConnectionSpec) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(spec.server.trim())
            .port(resolve_port(spec.port))
            .username(&spec.user)
            .password(&spec.secret)
            .database(&spec.database)
            .application_name("transferflow")
            .disable_statement_logging()
    }

    pub async fn open(&self, spec: &ConnectionSpec) -> anyhow::Result<PgConnection> {
        let opts = Self::options(spec);
        let conn = tokio::time::timeout(self.timeout, opts.connect())
            .await
            .with_context(|| {
                format!(
                    "connecting to {}/{} timed out after {}s",
                    spec.server,
                    spec.database,
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("connecting to {}/{}", spec.server, spec.database))?;
        Ok(conn)
    }

    /// Open and close a connection to check the credentials.
    pub async fn probe(&self, spec: &ConnectionSpec) -> anyhow::Result<()> {
        let conn = self.open(spec).await?;
        conn.close().await?;
        Ok(())
    }
}

fn resolve_port(port: Option<i32>) -> u16 {
    port.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_PORT)
}

/// Close without caring about the outcome; the run is already finished with it.
pub async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing job connection failed");
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_port;

    #[test]
    fn port_falls_back_to_postgres_default() {
        assert_eq!(resolve_port(None), 5432);
        assert_eq!(resolve_port(Some(6432)), 6432);
        assert_eq!(resolve_port(Some(0)), 5432);
        assert_eq!(resolve_port(Some(-1)), 5432);
        assert_eq!(resolve_port(Some(70_000)), 5432);
    }
}
