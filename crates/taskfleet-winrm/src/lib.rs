//! Remote PowerShell execution over WinRM.
//!
//! Higher layers talk to the [`PsExecutor`] trait only; the production
//! implementation is [`WinRmExecutor`], which speaks WS-Management over
//! HTTP port 5985 with NTLM authentication, the protocol the fleet's
//! hosts already accept.

pub mod error;
mod ntlm;
pub mod session;
mod soap;

use async_trait::async_trait;

// Re-exports
pub use error::{Error, Result};
pub use session::WinRmExecutor;

/// Outcome of one remote script run. Transport failures, authentication
/// failures and nonzero exit codes all surface as `success == false` with
/// a human-readable message in `output`; callers that need to tell them
/// apart can only inspect the string. Discovery's fallback logic depends
/// on this uniformity, so it is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub success: bool,
    pub output: String,
}

impl ExecOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, output: message.into() }
    }
}

/// One credential-bound remote shell for one host. Implementations open a
/// fresh authenticated session per call; there is no pooling, no retry and
/// no state between calls.
#[async_trait]
pub trait PsExecutor: Send + Sync {
    async fn run_ps(&self, script: &str) -> ExecOutcome;

    /// Label used in logs and scan results, usually the host name.
    fn host_label(&self) -> &str;
}
