use crate::jobs::model::{ConnectionSpec, SavedConnection};
use sqlx::PgPool;

/// Named credentials offered when authoring jobs. Not used at run time.
#[derive(Clone)]
pub struct SavedConnectionsRepo {
    pool: PgPool,
}

impl SavedConnectionsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> anyhow::Result<Vec<SavedConnection>> {
        let rows = sqlx::query_as::<_, SavedConnection>(
            "SELECT * FROM saved_connections ORDER BY conn_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<SavedConnection>> {
        let row = sqlx::query_as::<_, SavedConnection>(
            "SELECT * FROM saved_connections WHERE conn_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create(&self, name: &str, spec: &ConnectionSpec) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO saved_connections (conn_name, server, username, passw, dbname, port)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING conn_id
            "#,
        )
        .bind(name)
        .bind(&spec.server)
        .bind(&spec.user)
        .bind(&spec.secret)
        .bind(&spec.database)
        .bind(spec.port)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn update(&self, id: i64, name: &str, spec: &ConnectionSpec) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE saved_connections
            SET conn_name = $2, server = $3, username = $4, passw = $5, dbname = $6, port = $7
            WHERE conn_id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&spec.server)
        .bind(&spec.user)
        .bind(&spec.secret)
        .bind(&spec.database)
        .bind(spec.port)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM saved_connections WHERE conn_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
