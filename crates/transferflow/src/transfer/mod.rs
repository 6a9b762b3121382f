pub mod connect;
pub mod exists;
pub mod locks;
pub mod mapping;
pub mod notify;
pub mod runner;
pub mod sql;
pub mod triggers;
pub mod unit;

pub use connect::ConnectionResolver;
pub use locks::RunLocks;
pub use notify::{NoopNotifier, Notifier, RecordingNotifier, SmtpNotifier};
pub use runner::{JobRunner, RunOutcome, RunReport, UnitReport};
