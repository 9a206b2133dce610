//! End-to-end behavior of discovery, fleet scanning and mutations against
//! a scripted fake executor.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use taskfleet_core::display::{result_info, state_info};
use taskfleet_core::{
    AuditEntry, AuditSink, ErrorCatalog, ExecutionStyle, HostTarget, TaskSpec, TaskState,
    TriggerSpec,
};
use taskfleet_scheduler::{discover, scan_fleet, TaskAdmin};
use taskfleet_winrm::{ExecOutcome, PsExecutor};

/// Maps a script-substring marker to a canned outcome; scripts matching no
/// marker fail the way an unreachable host would.
struct FakeExecutor {
    host: String,
    responses: Vec<(&'static str, ExecOutcome)>,
    calls: AtomicUsize,
}

impl FakeExecutor {
    fn new(host: &str, responses: Vec<(&'static str, ExecOutcome)>) -> Self {
        Self { host: host.to_string(), responses, calls: AtomicUsize::new(0) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PsExecutor for FakeExecutor {
    async fn run_ps(&self, script: &str) -> ExecOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (marker, outcome) in &self.responses {
            if script.contains(marker) {
                return outcome.clone();
            }
        }
        ExecOutcome::failed("connection timed out")
    }

    fn host_label(&self) -> &str {
        &self.host
    }
}

#[derive(Default)]
struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

const DETAILED: &str = "Get-ScheduledTaskInfo";
const SUMMARY: &str = "Select-Object TaskName";
const SCHTASKS: &str = "schtasks /query";
const WMI: &str = "Get-WmiObject";

#[tokio::test]
async fn discovery_prefers_the_detailed_strategy() {
    let payload = r#"ManualTaskCount: 1
[{"TaskName":"Backup","State":3,"LastTaskResult":0,"NextRunTime":"2024-03-09T06:00:00","TaskPath":"\\","Author":"CORP\\admin"}]"#;
    let executor = FakeExecutor::new("PC-A", vec![(DETAILED, ExecOutcome::ok(payload))]);

    let records = discover(&executor).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task_name, "Backup");
    // Only the first strategy should have run.
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn discovery_falls_back_to_csv() {
    let csv = "\"TaskName\",\"Status\",\"Last Result\"\n\
               \"\\Backup\",\"Ready\",\"0\"\n\
               \"\\Sync\",\"Disabled\",\"1\"\n\
               \"\\Report\",\"Ready\",\"0\"\n";
    let executor = FakeExecutor::new(
        "PC-B",
        vec![
            (DETAILED, ExecOutcome::failed("The term 'Get-ScheduledTask' is not recognized")),
            (SUMMARY, ExecOutcome::failed("The term 'Get-ScheduledTask' is not recognized")),
            (SCHTASKS, ExecOutcome::ok(csv)),
        ],
    );

    let records = discover(&executor).await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].task_name, "Backup");
    assert_eq!(records[1].state, TaskState::Disabled);
}

#[tokio::test]
async fn empty_detailed_result_falls_through_to_summary() {
    let summary = r#"[{"TaskName":"Probe1","State":3},{"TaskName":"Probe2","State":1}]"#;
    let executor = FakeExecutor::new(
        "PC-C",
        vec![
            (DETAILED, ExecOutcome::ok("ManualTaskCount: 0\n[]")),
            (SUMMARY, ExecOutcome::ok(summary)),
        ],
    );

    let records = discover(&executor).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].task_name, "Probe1");
}

#[tokio::test]
async fn all_strategies_failing_yields_empty_list() {
    let executor = FakeExecutor::new(
        "PC-D",
        vec![(WMI, ExecOutcome::ok("WmiError: Access denied"))],
    );

    let records = discover(&executor).await;
    assert!(records.is_empty());
    // Every strategy was attempted.
    assert_eq!(executor.call_count(), 4);
}

#[tokio::test]
async fn fleet_scan_is_fail_open() {
    let healthy_payload =
        r#"[{"TaskName":"Backup","State":3},{"TaskName":"Sync","State":3}]"#;

    let hosts = vec![
        HostTarget { name: "PC-DEAD".to_string(), address: "10.0.0.1".to_string(), group: None },
        HostTarget { name: "PC-OK".to_string(), address: "10.0.0.2".to_string(), group: None },
        HostTarget { name: "PC-NOCRED".to_string(), address: "10.0.0.3".to_string(), group: None },
    ];

    let scans = scan_fleet(
        &hosts,
        |host| -> Option<Arc<dyn PsExecutor>> {
            match host.name.as_str() {
                "PC-DEAD" => Some(Arc::new(FakeExecutor::new("PC-DEAD", vec![]))),
                "PC-OK" => Some(Arc::new(FakeExecutor::new(
                    "PC-OK",
                    vec![(DETAILED, ExecOutcome::ok(healthy_payload))],
                ))),
                _ => None,
            }
        },
        4,
    )
    .await;

    assert_eq!(scans.len(), 3);
    assert_eq!(scans[0].host.name, "PC-DEAD");
    assert!(scans[0].tasks.is_empty());
    assert!(scans[0].skipped.is_none());
    assert_eq!(scans[1].tasks.len(), 2);
    assert!(scans[2].skipped.is_some());
}

#[tokio::test]
async fn pc_a_scenario_end_to_end() {
    let payload = r#"[{"TaskName":"Backup","State":3,"LastTaskResult":0,"NextRunTime":"2024-03-09T06:00:00"}]"#;
    let executor = FakeExecutor::new("PC-A", vec![(DETAILED, ExecOutcome::ok(payload))]);

    let records = discover(&executor).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];

    assert_eq!(record.task_name, "Backup");
    assert_eq!(record.state, TaskState::Ready);
    assert_eq!(record.last_task_result, Some(0));
    assert_eq!(
        record.next_run_time,
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(6, 0, 0)
    );

    let catalog = ErrorCatalog::default();
    assert_eq!(result_info(record, &catalog).label, "Success");
    assert_eq!(state_info(record.state).label, "Ready");
    assert!(record.state.is_enabled());
}

fn backup_spec() -> TaskSpec {
    TaskSpec {
        task_name: "RoundTrip".to_string(),
        description: None,
        run_as: "SYSTEM".to_string(),
        execution: ExecutionStyle::Standard {
            program_path: "C:\\bin\\job.exe".to_string(),
            arguments: String::new(),
        },
        trigger: TriggerSpec::Once,
    }
}

#[tokio::test]
async fn create_then_delete_leaves_exactly_two_audit_entries() {
    let executor = FakeExecutor::new(
        "PC-A",
        vec![
            ("Register-ScheduledTask", ExecOutcome::ok("")),
            ("Unregister-ScheduledTask", ExecOutcome::ok("")),
        ],
    );
    let audit = MemoryAuditSink::default();
    let admin = TaskAdmin::new(&executor, &audit, "operator");

    let created = admin.create(&backup_spec()).await.unwrap();
    assert!(created.success);
    let deleted = admin.delete("RoundTrip").await.unwrap();
    assert!(deleted.success);

    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action_type.as_str(), "CREATE_TASK");
    assert_eq!(entries[1].action_type.as_str(), "DELETE_TASK");
    assert_eq!(entries[1].target_pc, "PC-A");
}

#[tokio::test]
async fn failed_mutation_writes_no_audit_entry_and_passes_message_through() {
    let executor = FakeExecutor::new(
        "PC-A",
        vec![(
            "Unregister-ScheduledTask",
            ExecOutcome::failed("No matching task was found"),
        )],
    );
    let audit = MemoryAuditSink::default();
    let admin = TaskAdmin::new(&executor, &audit, "operator");

    let outcome = admin.delete("Missing").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "No matching task was found");
    assert!(audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_input_never_reaches_the_host() {
    let executor = FakeExecutor::new("PC-A", vec![]);
    let audit = MemoryAuditSink::default();
    let admin = TaskAdmin::new(&executor, &audit, "operator");

    let outcome = admin.delete("bad'; Remove-Item *").await.unwrap();
    assert!(!outcome.success);
    assert_eq!(executor.call_count(), 0);
    assert!(audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn enable_disable_audits_state_updates() {
    let executor = FakeExecutor::new(
        "PC-A",
        vec![
            ("Enable-ScheduledTask", ExecOutcome::ok("")),
            ("Disable-ScheduledTask", ExecOutcome::ok("")),
        ],
    );
    let audit = MemoryAuditSink::default();
    let admin = TaskAdmin::new(&executor, &audit, "operator");

    assert!(admin.set_enabled("Backup", true).await.unwrap().success);
    assert!(admin.set_enabled("Backup", false).await.unwrap().success);

    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.action_type.as_str() == "UPDATE_TASK_STATE"));
    assert_eq!(entries[0].details, "Task enabled");
    assert_eq!(entries[1].details, "Task disabled");
}

#[tokio::test]
async fn no_credential_host_does_not_break_the_scan() {
    // A factory that can never build an executor still produces one scan
    // per host.
    let hosts = vec![HostTarget {
        name: "PC-X".to_string(),
        address: "10.0.0.9".to_string(),
        group: Some("lab".to_string()),
    }];
    let scans = scan_fleet(&hosts, |_| None::<Arc<dyn PsExecutor>>, 2).await;
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].skipped.as_deref(), Some("no credential configured"));
}
