// src/jobs/error_codes.rs
use std::fmt;

/// Where a run went wrong. The code prefixes log lines and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SourceConnection,
    TargetConnection,
    SourceRead,
    RowInsert,
    TriggerCheck,
    ExistenceCheck,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceConnection => "SOURCE_CONNECTION",
            Self::TargetConnection => "TARGET_CONNECTION",
            Self::SourceRead => "SOURCE_READ",
            Self::RowInsert => "ROW_INSERT",
            Self::TriggerCheck => "TRIGGER_CHECK",
            Self::ExistenceCheck => "EXISTENCE_CHECK",
        }
    }

    /// How far the failure reaches inside one run.
    pub fn scope(&self) -> FailureScope {
        match self {
            Self::SourceConnection | Self::TargetConnection => FailureScope::Run,
            Self::SourceRead => FailureScope::Unit,
            Self::RowInsert => FailureScope::Row,
            Self::TriggerCheck | Self::ExistenceCheck => FailureScope::Check,
        }
    }

    /// Check failures are resolved by policy and never reach the notifier.
    pub fn notifies(&self) -> bool {
        self.scope() != FailureScope::Check
    }

    pub fn describe(&self, detail: impl fmt::Display) -> String {
        format!("[{}] {}", self.as_str(), detail)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    Run,
    Unit,
    Row,
    Check,
}
