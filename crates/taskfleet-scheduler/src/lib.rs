//! Remote task discovery and administration.
//!
//! Scheduled-task tooling on Windows varies by OS version, locale and
//! permission level; no single query works across a whole fleet. This crate
//! holds the query strategy scripts, the noise-tolerant payload extraction,
//! the fallback orchestrator that tries strategies in order, the bounded
//! fleet fan-out, and the audited mutation operations.

pub mod discovery;
pub mod error;
pub mod extract;
pub mod fleet;
pub mod mutations;
pub mod parse;
pub mod scripts;

// Re-exports
pub use discovery::discover;
pub use error::{Error, Result};
pub use fleet::{scan_fleet, HostScan, DEFAULT_FAN_OUT};
pub use mutations::{MutationOutcome, TaskAdmin};
pub use scripts::{QueryStrategy, StrategyKind};
