//! Pure presentation helpers consumed by the dashboard layer. None of these
//! perform I/O and none of them may fail: every input, however malformed,
//! maps to some displayable string.

use crate::errcodes::ErrorCatalog;
use crate::task::{TaskRecord, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    pub label: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultInfo {
    pub label: String,
    pub icon: &'static str,
}

impl ResultInfo {
    /// True only for real failures, not for never-run or in-progress tasks.
    pub fn is_failure(&self) -> bool {
        self.icon == "❌"
    }
}

/// Fixed five-way mapping for scheduler state codes.
pub fn state_info(state: TaskState) -> StateInfo {
    match state {
        TaskState::Unknown => StateInfo { label: "Unknown", icon: "❓" },
        TaskState::Disabled => StateInfo { label: "Disabled", icon: "🔴" },
        TaskState::Queued => StateInfo { label: "Queued", icon: "🟡" },
        TaskState::Ready => StateInfo { label: "Ready", icon: "🟢" },
        TaskState::Running => StateInfo { label: "Running", icon: "🟡" },
    }
}

/// Classify a task's last run result. A missing or non-coercible result code
/// means the task has never run; zero is success; anything else is looked up
/// in the error catalog, with "currently running" codes shown as in-progress
/// rather than as errors.
pub fn result_info(task: &TaskRecord, catalog: &ErrorCatalog) -> ResultInfo {
    let code = match task.last_task_result {
        Some(code) => code,
        None => {
            return ResultInfo {
                label: "Not yet run".to_string(),
                icon: "⏸️",
            }
        }
    };

    if code == 0 {
        return ResultInfo {
            label: "Success".to_string(),
            icon: "✅",
        };
    }

    let message = catalog.message_for(code);
    let lowered = message.to_lowercase();
    if lowered.contains("running") || message.contains("実行中") {
        return ResultInfo {
            label: "In progress".to_string(),
            icon: "🔄",
        };
    }

    ResultInfo {
        label: message,
        icon: "❌",
    }
}

pub fn format_datetime(value: Option<chrono::NaiveDateTime>) -> String {
    match value {
        Some(dt) => dt.format("%Y/%m/%d %H:%M").to_string(),
        None => "Not set".to_string(),
    }
}

/// Summarize the flattened trigger blob produced by the typed enumeration
/// strategy. The blob is free text, not structured data: we pull out the
/// start time (hour:minute of the StartBoundary) and any nonzero repeat
/// intervals, and fall back to coarse labels when nothing is recognizable.
pub fn format_trigger(trigger_raw: &str) -> String {
    let trimmed = trigger_raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return "Not set".to_string();
    }

    let mut start_time: Option<String> = None;
    let mut days_interval: Option<String> = None;
    let mut hours_interval: Option<String> = None;
    let mut minutes_interval: Option<String> = None;

    for line in trimmed.lines() {
        let line = line.trim();
        if let Some(value) = field_value(line, "StartBoundary") {
            start_time = Some(value);
        } else if let Some(value) = field_value(line, "DaysInterval") {
            days_interval = Some(value);
        } else if let Some(value) = field_value(line, "HoursInterval") {
            hours_interval = Some(value);
        } else if let Some(value) = field_value(line, "MinutesInterval") {
            minutes_interval = Some(value);
        }
    }

    let time_str = match start_time {
        Some(raw) => hour_minute(&raw),
        None => {
            // Non-empty but unrecognizable blob.
            return "Has a trigger".to_string();
        }
    };

    let mut interval_parts = Vec::new();
    if let Some(days) = nonzero(days_interval) {
        interval_parts.push(format!("{}d", days));
    }
    if let Some(hours) = nonzero(hours_interval) {
        interval_parts.push(format!("{}h", hours));
    }
    if let Some(minutes) = nonzero(minutes_interval) {
        interval_parts.push(format!("{}m", minutes));
    }

    if interval_parts.is_empty() {
        time_str
    } else {
        format!("{} | {}", time_str, interval_parts.join(" "))
    }
}

fn field_value(line: &str, field: &str) -> Option<String> {
    if !line.contains(field) {
        return None;
    }
    let (_, rest) = line.split_once(':')?;
    let value = rest.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Pull "HH:MM" out of an ISO-ish timestamp such as `2024-03-09T06:00:00`.
fn hour_minute(start: &str) -> String {
    if let Some((_, time_part)) = start.split_once('T') {
        let pieces: Vec<&str> = time_part.split(':').collect();
        if pieces.len() >= 2 {
            return format!("{}:{}", pieces[0], pieces[1]);
        }
    }
    start.to_string()
}

fn nonzero(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    fn record_with_result(result: Option<i64>) -> TaskRecord {
        TaskRecord {
            last_task_result: result,
            ..TaskRecord::new("Backup")
        }
    }

    #[test]
    fn state_labels_are_fixed() {
        assert_eq!(state_info(TaskState::Unknown).label, "Unknown");
        assert_eq!(state_info(TaskState::Disabled).label, "Disabled");
        assert_eq!(state_info(TaskState::Queued).label, "Queued");
        assert_eq!(state_info(TaskState::Ready).label, "Ready");
        assert_eq!(state_info(TaskState::Running).label, "Running");
    }

    #[test]
    fn missing_result_is_not_yet_run() {
        let catalog = ErrorCatalog::default();
        let info = result_info(&record_with_result(None), &catalog);
        assert_eq!(info.label, "Not yet run");
    }

    #[test]
    fn zero_result_is_success() {
        let catalog = ErrorCatalog::default();
        let info = result_info(&record_with_result(Some(0)), &catalog);
        assert_eq!(info.label, "Success");
        assert_eq!(info.icon, "✅");
    }

    #[test]
    fn nonzero_result_uses_catalog_message() {
        let catalog = ErrorCatalog::default();
        let info = result_info(&record_with_result(Some(4)), &catalog);
        assert_eq!(info.label, catalog.message_for(4));
        assert_eq!(info.icon, "❌");
    }

    #[test]
    fn running_code_maps_to_in_progress() {
        let catalog = ErrorCatalog::default();
        // 0x00041301: task is currently running.
        let info = result_info(&record_with_result(Some(267009)), &catalog);
        assert_eq!(info.label, "In progress");
        assert_eq!(info.icon, "🔄");
    }

    #[test]
    fn unknown_code_falls_back_to_generic_error() {
        let catalog = ErrorCatalog::default();
        let info = result_info(&record_with_result(Some(123456789)), &catalog);
        assert!(info.label.contains("123456789"));
    }

    #[test]
    fn trigger_with_time_and_interval() {
        let raw = "Enabled: True\nStartBoundary: 2024-03-09T06:00:00\nDaysInterval: 1\nHoursInterval: 0\nMinutesInterval: 0";
        assert_eq!(format_trigger(raw), "06:00 | 1d");
    }

    #[test]
    fn trigger_with_time_only() {
        let raw = "Enabled: True\nStartBoundary: 2024-03-09T23:30:00";
        assert_eq!(format_trigger(raw), "23:30");
    }

    #[test]
    fn empty_trigger_is_not_set() {
        assert_eq!(format_trigger(""), "Not set");
        assert_eq!(format_trigger("null"), "Not set");
    }

    #[test]
    fn unparseable_trigger_falls_back() {
        assert_eq!(format_trigger("MSFT_TaskRepetitionPattern (garbage)"), "Has a trigger");
    }

    #[test]
    fn format_datetime_handles_absence() {
        assert_eq!(format_datetime(None), "Not set");
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(format_datetime(Some(dt)), "2024/03/09 06:00");
    }
}
