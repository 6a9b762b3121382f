pub mod error_codes;
pub mod logs;
pub mod model;
pub mod repo;
pub mod retry;
pub mod saved_connections;
pub mod settings;

pub use error_codes::FailureKind;
pub use logs::LogsRepo;
pub use model::{
    ColumnMapping, ConnectionSpec, ConvertType, JobDefinition, JobListItem, LogEntry, NewTrigger,
    SavedConnection, TransferJob, TriggerEdge,
};
pub use repo::JobsRepo;
pub use saved_connections::SavedConnectionsRepo;
pub use settings::SettingsRepo;
