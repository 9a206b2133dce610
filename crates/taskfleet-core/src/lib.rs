pub mod audit;
pub mod config;
pub mod display;
pub mod errcodes;
pub mod error;
pub mod task;

// Re-exports
pub use audit::{ActionType, AuditEntry, AuditSink};
pub use config::{AppConfig, Credential, CredentialStore, HostTarget};
pub use errcodes::ErrorCatalog;
pub use error::{Error, Result};
pub use task::{ExecutionStyle, TaskRecord, TaskSpec, TaskState, TriggerSpec};
