use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Credentials for one side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub server: String,
    #[serde(default)]
    pub port: Option<i32>,
    pub user: String,
    pub secret: String,
    pub database: String,
}

impl ConnectionSpec {
    fn from_prefixed(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            server: row.try_get(format!("{prefix}_server").as_str())?,
            port: row.try_get(format!("{prefix}_port").as_str())?,
            user: row.try_get(format!("{prefix}_user").as_str())?,
            secret: row.try_get(format!("{prefix}_password").as_str())?,
            database: row.try_get(format!("{prefix}_db").as_str())?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferJob {
    pub id: i64,
    pub name: String,
    pub source: ConnectionSpec,
    pub target: ConnectionSpec,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for TransferJob {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("job_id")?,
            name: row.try_get("job_name")?,
            source: ConnectionSpec::from_prefixed(row, "source")?,
            target: ConnectionSpec::from_prefixed(row, "target")?,
            created_at: row.try_get("created_at")?,
            last_run_at: row.try_get("last_run_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobListItem {
    pub job_id: i64,
    pub job_name: String,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertType {
    #[default]
    None,
    DateTime,
    Int,
    Float,
}

impl ConvertType {
    /// Unknown names fall back to `None` so the value passes through untouched.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("datetime") => Self::DateTime,
            Some("int") => Self::Int,
            Some("float") => Self::Float,
            _ => Self::None,
        }
    }

    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::DateTime => Some("datetime"),
            Self::Int => Some("int"),
            Self::Float => Some("float"),
        }
    }
}

/// One column rule of a job, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_table: String,
    pub target_table: String,
    #[serde(default)]
    pub source_column: Option<String>,
    pub target_column: String,
    #[serde(default)]
    pub fixed_value: Option<String>,
    #[serde(default)]
    pub convert_type: ConvertType,
    #[serde(default)]
    pub is_key: bool,
}

impl ColumnMapping {
    /// Source column name, if the mapping reads one. Blank names count as unset.
    pub fn source_column(&self) -> Option<&str> {
        self.source_column.as_deref().filter(|c| !c.is_empty())
    }

    /// Fixed value, if any. Empty strings are treated as "no fixed value".
    pub fn fixed_value(&self) -> Option<&str> {
        self.fixed_value.as_deref().filter(|v| !v.is_empty())
    }
}

impl<'r> FromRow<'r, PgRow> for ColumnMapping {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let convert: Option<String> = row.try_get("convert_type")?;
        Ok(Self {
            source_table: row.try_get("source_table")?,
            target_table: row.try_get("target_table")?,
            source_column: row.try_get("source_column")?,
            target_column: row.try_get("target_column")?,
            fixed_value: row.try_get("fixed_value")?,
            convert_type: ConvertType::parse(convert.as_deref()),
            is_key: row.try_get("is_key")?,
        })
    }
}

/// Dependency edge: `job_id` waits for `check_value` in `dependent_job_id`'s target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TriggerEdge {
    pub trigger_id: i64,
    pub job_id: i64,
    pub dependent_job_id: i64,
    pub check_table: String,
    pub check_column: String,
    pub check_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrigger {
    pub dependent_job_id: i64,
    pub check_table: String,
    pub check_column: String,
    pub check_value: String,
}

/// Everything the authoring side supplies to create or update a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub source: ConnectionSpec,
    pub target: ConnectionSpec,
    #[serde(default)]
    pub mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub triggers: Vec<NewTrigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub log_id: i64,
    pub job_id: i64,
    pub logged_at: DateTime<Utc>,
    pub log_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConnection {
    pub id: i64,
    pub name: String,
    pub spec: ConnectionSpec,
}

impl<'r> FromRow<'r, PgRow> for SavedConnection {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("conn_id")?,
            name: row.try_get("conn_name")?,
            spec: ConnectionSpec {
                server: row.try_get("server")?,
                port: row.try_get("port")?,
                user: row.try_get("username")?,
                secret: row.try_get("passw")?,
                database: row.try_get("dbname")?,
            },
        })
    }
}
