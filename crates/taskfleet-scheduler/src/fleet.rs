//! Fleet-wide discovery with bounded concurrent fan-out.
//!
//! Hosts are scanned independently: each gets its own credential-bound
//! executor, and a host that times out or fails in any way simply yields
//! an empty scan. There is no shared mutable state between host scans and
//! no way for one host to cancel another.

use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use taskfleet_core::{HostTarget, TaskRecord};
use taskfleet_winrm::PsExecutor;

use crate::discovery;

/// Default fan-out width. Remote calls block for up to the transport
/// timeout, so this bounds a sweep's wall clock at roughly
/// `ceil(hosts / FAN_OUT) * timeout` in the worst case.
pub const DEFAULT_FAN_OUT: usize = 8;

#[derive(Debug, Clone)]
pub struct HostScan {
    pub host: HostTarget,
    pub tasks: Vec<TaskRecord>,
    /// Set when no executor could be built for the host (missing
    /// credential); transport failures are absorbed by discovery itself.
    pub skipped: Option<String>,
}

/// Scan every host, `limit` at a time, preserving input order in the
/// result. `make_executor` resolves a host to its executor; returning
/// `None` (no credential) records a skipped scan instead of failing.
pub async fn scan_fleet<F>(hosts: &[HostTarget], make_executor: F, limit: usize) -> Vec<HostScan>
where
    F: Fn(&HostTarget) -> Option<Arc<dyn PsExecutor>>,
{
    let limit = limit.max(1);
    // Resolve executors and clone hosts up front so the stream below owns
    // everything it touches; borrowing `hosts` inside the async machinery
    // trips rustc's higher-ranked lifetime inference (rust-lang #102211)
    // when the resulting future is used as an axum handler.
    let jobs: Vec<(usize, HostTarget, Option<Arc<dyn PsExecutor>>)> = hosts
        .iter()
        .enumerate()
        .map(|(index, host)| (index, host.clone(), make_executor(host)))
        .collect();
    let mut scans: Vec<(usize, HostScan)> = stream::iter(jobs)
        .map(|(index, host, executor)| {
            async move {
                let scan = match executor {
                    Some(executor) => {
                        let tasks = discovery::discover(executor.as_ref()).await;
                        HostScan { host, tasks, skipped: None }
                    }
                    None => {
                        tracing::warn!(host = %host.name, "No credential; skipping host");
                        HostScan {
                            host,
                            tasks: Vec::new(),
                            skipped: Some("no credential configured".to_string()),
                        }
                    }
                };
                (index, scan)
            }
            // Box to erase the async block's opaque type; leaving it
            // opaque trips the same rustc lifetime-inference bug noted
            // above when the caller is an axum handler.
            .boxed()
        })
        .buffer_unordered(limit)
        // Erase the stream type as well: the closure type above mentions
        // `dyn PsExecutor`, which the same bug rejects if it survives
        // into the caller's future.
        .boxed()
        .collect()
        .await;

    scans.sort_by_key(|(index, _)| *index);
    scans.into_iter().map(|(_, scan)| scan).collect()
}
