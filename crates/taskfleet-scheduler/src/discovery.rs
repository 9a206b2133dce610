//! The fallback orchestrator: try each query strategy in order, take the
//! first usable result, and fail open. An unreachable or misconfigured
//! host contributes zero tasks, never an error; one bad host must not
//! abort a fleet-wide view.

use taskfleet_core::TaskRecord;
use taskfleet_winrm::PsExecutor;

use crate::parse;
use crate::scripts::{self, StrategyKind};

/// Enumerate the scheduled tasks on one host. Never returns an error.
pub async fn discover(executor: &dyn PsExecutor) -> Vec<TaskRecord> {
    let host = executor.host_label();

    for strategy in scripts::strategies() {
        tracing::debug!(host, strategy = strategy.name, "Trying query strategy");
        let outcome = executor.run_ps(&strategy.script).await;

        if !outcome.success {
            tracing::debug!(
                host,
                strategy = strategy.name,
                "Strategy failed: {}",
                outcome.output.trim()
            );
            continue;
        }

        match strategy.kind {
            StrategyKind::Json => {
                let records = parse::tasks_from_json(&outcome.output);
                if !records.is_empty() {
                    tracing::info!(
                        host,
                        strategy = strategy.name,
                        count = records.len(),
                        "Discovery succeeded"
                    );
                    return records;
                }
            }
            StrategyKind::Csv => {
                let records = parse::tasks_from_csv(&outcome.output);
                if !records.is_empty() {
                    tracing::info!(
                        host,
                        strategy = strategy.name,
                        count = records.len(),
                        "Discovery succeeded via CSV fallback"
                    );
                    return records;
                }
            }
            StrategyKind::Diagnostic => {
                // Visibility only; WMI output never produces records.
                tracing::info!(host, "WMI diagnostic output: {}", outcome.output.trim());
            }
        }
    }

    tracing::warn!(host, "All query strategies failed or returned nothing");
    Vec::new()
}
