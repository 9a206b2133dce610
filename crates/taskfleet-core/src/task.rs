use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Scheduler state codes as reported by `Get-ScheduledTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Unknown,
    Disabled,
    Queued,
    Ready,
    Running,
}

impl TaskState {
    /// Map a raw state code to a state. Codes outside 0..=4 collapse to
    /// `Unknown` rather than failing the record.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TaskState::Disabled,
            2 => TaskState::Queued,
            3 => TaskState::Ready,
            4 => TaskState::Running,
            _ => TaskState::Unknown,
        }
    }

    /// The state names schtasks and WMI report instead of numeric codes.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Disabled" | "無効" => TaskState::Disabled,
            "Queued" => TaskState::Queued,
            "Ready" | "準備完了" => TaskState::Ready,
            "Running" | "実行中" => TaskState::Running,
            _ => TaskState::Unknown,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            TaskState::Unknown => 0,
            TaskState::Disabled => 1,
            TaskState::Queued => 2,
            TaskState::Ready => 3,
            TaskState::Running => 4,
        }
    }

    /// A task counts as enabled for display purposes when it is ready or
    /// already running.
    pub fn is_enabled(&self) -> bool {
        matches!(self, TaskState::Ready | TaskState::Running)
    }
}

/// One scheduled task on one host, normalized from whichever query strategy
/// produced it. Absent timestamps mean "not scheduled" / "never run"; a
/// value that failed to parse is dropped to `None`, never coerced to a
/// fabricated date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_name: String,
    pub task_path: String,
    pub state: TaskState,
    pub next_run_time: Option<NaiveDateTime>,
    pub last_run_time: Option<NaiveDateTime>,
    pub last_task_result: Option<i64>,
    pub description: Option<String>,
    pub author: String,
    /// Opaque multi-line trigger description produced by the host. Only
    /// heuristically parseable, see `display::format_trigger`.
    pub trigger_raw: Option<String>,
}

impl TaskRecord {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            task_path: "\\".to_string(),
            state: TaskState::Unknown,
            next_run_time: None,
            last_run_time: None,
            last_task_result: None,
            description: None,
            author: String::new(),
            trigger_raw: None,
        }
    }
}

/// How the task's action is launched on the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionStyle {
    /// Run an executable directly.
    Standard {
        program_path: String,
        #[serde(default)]
        arguments: String,
    },
    /// Run a script through an interpreter (python, etc.).
    Interpreter {
        interpreter_path: String,
        script_path: String,
        #[serde(default)]
        arguments: String,
    },
}

/// Scheduling rule for a new task. Only daily triggers are supported; any
/// other request registers a one-shot trigger firing a minute out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    Daily { at: NaiveTime },
    Once,
}

/// Everything needed to register one task on one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "TaskSpec::default_run_as")]
    pub run_as: String,
    pub execution: ExecutionStyle,
    pub trigger: TriggerSpec,
}

impl TaskSpec {
    fn default_run_as() -> String {
        "SYSTEM".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for code in 0..=4 {
            assert_eq!(TaskState::from_code(code).code(), code);
        }
    }

    #[test]
    fn out_of_range_state_is_unknown() {
        assert_eq!(TaskState::from_code(-1), TaskState::Unknown);
        assert_eq!(TaskState::from_code(99), TaskState::Unknown);
    }

    #[test]
    fn enabled_means_ready_or_running() {
        assert!(TaskState::Ready.is_enabled());
        assert!(TaskState::Running.is_enabled());
        assert!(!TaskState::Disabled.is_enabled());
        assert!(!TaskState::Queued.is_enabled());
        assert!(!TaskState::Unknown.is_enabled());
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: TaskSpec = serde_json::from_str(
            r#"{
                "task_name": "NightlyBackup",
                "execution": {"type": "standard", "program_path": "C:\\bin\\backup.exe"},
                "trigger": {"type": "daily", "at": "03:00:00"}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.run_as, "SYSTEM");
        assert!(spec.description.is_none());
    }
}
