//! The periodic fleet sweep: discover tasks everywhere, record failures
//! that are not already known, analyze and notify.

use anyhow::Result;
use std::sync::Arc;

use taskfleet_ai::{ChatNotifier, ErrorContext, GeminiAnalyzer};
use taskfleet_core::display::result_info;
use taskfleet_core::{AppConfig, CredentialStore, ErrorCatalog, HostTarget, TaskRecord};
use taskfleet_db::Database;
use taskfleet_scheduler::{scan_fleet, DEFAULT_FAN_OUT};
use taskfleet_winrm::{PsExecutor, WinRmExecutor};

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub hosts_scanned: usize,
    pub hosts_skipped: usize,
    pub tasks_seen: usize,
    pub failures_recorded: usize,
}

pub struct FleetScanner {
    config: AppConfig,
    credentials: CredentialStore,
    catalog: ErrorCatalog,
    db: Arc<Database>,
    analyzer: GeminiAnalyzer,
    notifier: ChatNotifier,
}

impl FleetScanner {
    pub fn new(
        config: AppConfig,
        credentials: CredentialStore,
        catalog: ErrorCatalog,
        db: Arc<Database>,
        analyzer: GeminiAnalyzer,
        notifier: ChatNotifier,
    ) -> Self {
        Self { config, credentials, catalog, db, analyzer, notifier }
    }

    /// One full sweep with production WinRM executors.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        self.sweep_with(|host| {
            let credential = self.credentials.lookup(&host.name)?.clone();
            match WinRmExecutor::new(&host.name, &host.address, credential) {
                Ok(executor) => Some(Arc::new(executor) as Arc<dyn PsExecutor>),
                Err(e) => {
                    tracing::error!(host = %host.name, "Cannot build WinRM executor: {}", e);
                    None
                }
            }
        })
        .await
    }

    /// Sweep with a caller-supplied executor factory.
    pub async fn sweep_with<F>(&self, make_executor: F) -> Result<SweepSummary>
    where
        F: Fn(&HostTarget) -> Option<Arc<dyn PsExecutor>>,
    {
        let scans = scan_fleet(self.config.list_hosts(), make_executor, DEFAULT_FAN_OUT).await;

        let mut summary = SweepSummary::default();
        for scan in scans {
            if scan.skipped.is_some() {
                summary.hosts_skipped += 1;
                continue;
            }
            summary.hosts_scanned += 1;
            summary.tasks_seen += scan.tasks.len();

            for task in &scan.tasks {
                if self.handle_task(&scan.host.name, task).await? {
                    summary.failures_recorded += 1;
                }
            }
        }

        tracing::info!(
            hosts = summary.hosts_scanned,
            skipped = summary.hosts_skipped,
            tasks = summary.tasks_seen,
            failures = summary.failures_recorded,
            "Sweep complete"
        );
        Ok(summary)
    }

    /// Record one task's failure if it is new. Returns whether a log entry
    /// was written.
    async fn handle_task(&self, pc_name: &str, task: &TaskRecord) -> Result<bool> {
        let info = result_info(task, &self.catalog);
        if !info.is_failure() {
            return Ok(false);
        }

        // A failure we already recorded with the same code and message is
        // the same incident, not a new one.
        if let Some(latest) = self.db.latest_execution_log(pc_name, &task.task_name).await? {
            if latest.result_code == task.last_task_result && latest.result_message == info.label {
                tracing::debug!(
                    pc = pc_name,
                    task = %task.task_name,
                    "Failure already recorded; skipping"
                );
                return Ok(false);
            }
        }

        let log_id = self
            .db
            .add_execution_log(
                pc_name,
                &task.task_path,
                &task.task_name,
                task.last_task_result,
                &info.label,
            )
            .await?;
        tracing::warn!(
            pc = pc_name,
            task = %task.task_name,
            code = ?task.last_task_result,
            "Recorded task failure as log #{}",
            log_id
        );

        let context = ErrorContext {
            pc_name: pc_name.to_string(),
            task_name: task.task_name.clone(),
            result_code: task.last_task_result,
            result_message: info.label.clone(),
        };
        let analysis = self.analyzer.analyze(&context).await;
        self.db.update_ai_analysis(log_id, &analysis).await?;

        if let Err(e) = self
            .notifier
            .notify_failure(
                pc_name,
                &task.task_name,
                task.last_task_result,
                &info.label,
                Some(&analysis),
            )
            .await
        {
            // Notification failure must not abort the sweep.
            tracing::error!(pc = pc_name, task = %task.task_name, "Notification failed: {}", e);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskfleet_winrm::ExecOutcome;

    struct FakeExecutor {
        host: String,
        payload: String,
    }

    #[async_trait]
    impl PsExecutor for FakeExecutor {
        async fn run_ps(&self, script: &str) -> ExecOutcome {
            if script.contains("Get-ScheduledTaskInfo") {
                ExecOutcome::ok(self.payload.clone())
            } else {
                ExecOutcome::failed("unexpected script")
            }
        }

        fn host_label(&self) -> &str {
            &self.host
        }
    }

    fn scanner_with(config: AppConfig, db: Arc<Database>) -> FleetScanner {
        FleetScanner::new(
            config,
            CredentialStore::default(),
            ErrorCatalog::default(),
            db,
            GeminiAnalyzer::new(None),
            ChatNotifier::new(None),
        )
    }

    fn one_host_config() -> AppConfig {
        AppConfig {
            hosts: vec![HostTarget {
                name: "PC-A".to_string(),
                address: "10.0.0.1".to_string(),
                group: None,
            }],
            ..AppConfig::default()
        }
    }

    async fn memory_db() -> Arc<Database> {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.init_schema().await.unwrap();
        Arc::new(db)
    }

    fn failing_payload() -> String {
        r#"[{"TaskName":"Backup","State":3,"LastTaskResult":1},
            {"TaskName":"Sync","State":3,"LastTaskResult":0},
            {"TaskName":"Report","State":3}]"#
            .to_string()
    }

    #[tokio::test]
    async fn sweep_records_only_real_failures() {
        let db = memory_db().await;
        let scanner = scanner_with(one_host_config(), db.clone());

        let payload = failing_payload();
        let summary = scanner
            .sweep_with(|host| {
                Some(Arc::new(FakeExecutor {
                    host: host.name.clone(),
                    payload: payload.clone(),
                }) as Arc<dyn PsExecutor>)
            })
            .await
            .unwrap();

        assert_eq!(summary.hosts_scanned, 1);
        assert_eq!(summary.tasks_seen, 3);
        // Success and never-run tasks are not failures.
        assert_eq!(summary.failures_recorded, 1);

        let latest = db.latest_execution_log("PC-A", "Backup").await.unwrap().unwrap();
        assert_eq!(latest.result_code, Some(1));
        // Analysis is attached even when the analyzer has no API key.
        assert!(latest.ai_analysis.is_some());
    }

    #[tokio::test]
    async fn repeated_sweeps_do_not_duplicate_a_known_failure() {
        let db = memory_db().await;
        let scanner = scanner_with(one_host_config(), db.clone());

        let payload = failing_payload();
        for expected in [1, 0] {
            let summary = scanner
                .sweep_with(|host| {
                    Some(Arc::new(FakeExecutor {
                        host: host.name.clone(),
                        payload: payload.clone(),
                    }) as Arc<dyn PsExecutor>)
                })
                .await
                .unwrap();
            assert_eq!(summary.failures_recorded, expected);
        }
    }

    #[tokio::test]
    async fn a_new_failure_code_is_a_new_incident() {
        let db = memory_db().await;
        let scanner = scanner_with(one_host_config(), db.clone());

        for code in [1, 2] {
            let payload = format!(
                r#"[{{"TaskName":"Backup","State":3,"LastTaskResult":{}}}]"#,
                code
            );
            let summary = scanner
                .sweep_with(|host| {
                    Some(Arc::new(FakeExecutor {
                        host: host.name.clone(),
                        payload: payload.clone(),
                    }) as Arc<dyn PsExecutor>)
                })
                .await
                .unwrap();
            assert_eq!(summary.failures_recorded, 1);
        }
    }

    #[tokio::test]
    async fn hosts_without_credentials_are_counted_as_skipped() {
        let db = memory_db().await;
        let scanner = scanner_with(one_host_config(), db);

        let summary = scanner.sweep_with(|_| None).await.unwrap();
        assert_eq!(summary.hosts_scanned, 0);
        assert_eq!(summary.hosts_skipped, 1);
    }
}
