//! Normalize raw strategy output into `TaskRecord`s.
//!
//! The PowerShell side names fields in PascalCase and is sloppy about
//! types: state and result codes arrive as numbers, numeric strings or
//! state names depending on the strategy and host. Everything here is
//! best-effort per field: a value that cannot be interpreted becomes
//! absent, it never drops the record or fabricates a date.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::HashMap;

use taskfleet_core::{TaskRecord, TaskState};

use crate::extract;

/// Task records from a JSON-carrying strategy. A bare object is one task.
pub fn tasks_from_json(raw: &str) -> Vec<TaskRecord> {
    let value = match extract::extract_json_value(raw) {
        Some(value) => value,
        None => return Vec::new(),
    };

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return Vec::new(),
    };

    items.iter().filter_map(record_from_value).collect()
}

fn record_from_value(value: &Value) -> Option<TaskRecord> {
    let task_name = non_empty_string(value.get("TaskName"))?;

    Some(TaskRecord {
        task_name,
        task_path: non_empty_string(value.get("TaskPath")).unwrap_or_else(|| "\\".to_string()),
        state: state_from_value(value.get("State")),
        next_run_time: non_empty_string(value.get("NextRunTime"))
            .and_then(|s| parse_host_timestamp(&s)),
        last_run_time: non_empty_string(value.get("LastRunTime"))
            .and_then(|s| parse_host_timestamp(&s)),
        last_task_result: value.get("LastTaskResult").and_then(coerce_int),
        description: non_empty_string(value.get("Description")),
        author: non_empty_string(value.get("Author")).unwrap_or_default(),
        trigger_raw: non_empty_string(value.get("Trigger")),
    })
}

/// Task records from schtasks CSV output. schtasks names columns
/// differently across versions and locales, so each logical field has a
/// list of acceptable headers; `TaskName` carries the full folder path.
pub fn tasks_from_csv(raw: &str) -> Vec<TaskRecord> {
    extract::csv_rows(raw)
        .into_iter()
        .filter_map(|row| record_from_row(&row))
        .collect()
}

fn record_from_row(row: &HashMap<String, String>) -> Option<TaskRecord> {
    let full_name = field(row, &["TaskName", "タスク名"])?;
    if full_name.is_empty() {
        return None;
    }
    let (task_path, task_name) = split_task_path(&full_name);
    if task_name.is_empty() {
        return None;
    }

    let state = field(row, &["State", "Status", "Scheduled Task State", "状態"])
        .map(|s| state_from_text(&s))
        .unwrap_or(TaskState::Unknown);

    Some(TaskRecord {
        task_name,
        task_path,
        state,
        next_run_time: field(row, &["NextRunTime", "Next Run Time", "次回の実行時刻"])
            .and_then(|s| parse_host_timestamp(&s)),
        last_run_time: field(row, &["LastRunTime", "Last Run Time", "前回の実行時刻"])
            .and_then(|s| parse_host_timestamp(&s)),
        last_task_result: field(row, &["LastTaskResult", "Last Result", "前回の結果"])
            .and_then(|s| s.trim().parse().ok()),
        description: field(row, &["Description", "Comment", "コメント"]),
        author: field(row, &["Author", "作成者"]).unwrap_or_default(),
        // schtasks output often has no trigger column at all.
        trigger_raw: field(row, &["Trigger"]),
    })
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
        .map(str::to_string)
}

fn field(row: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| row.get(*name))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != "N/A")
}

/// `\Folder\Sub\Name` → (`\Folder\Sub\`, `Name`).
fn split_task_path(full_name: &str) -> (String, String) {
    match full_name.rfind('\\') {
        Some(pos) => (full_name[..pos + 1].to_string(), full_name[pos + 1..].to_string()),
        None => ("\\".to_string(), full_name.to_string()),
    }
}

/// ISO-like host-local timestamp, with or without a `T` separator; any
/// fractional seconds are truncated before parsing.
pub fn parse_host_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let value = value.split('.').next().unwrap_or(value);
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y/%m/%d %H:%M:%S"))
        .map_err(|e| {
            tracing::debug!("Unparseable timestamp {:?}: {}", value, e);
            e
        })
        .ok()
}

fn state_from_value(value: Option<&Value>) -> TaskState {
    match value {
        Some(value) => match coerce_int(value) {
            Some(code) => TaskState::from_code(code),
            None => value
                .as_str()
                .map(TaskState::from_name)
                .unwrap_or(TaskState::Unknown),
        },
        None => TaskState::Unknown,
    }
}

fn state_from_text(text: &str) -> TaskState {
    match text.trim().parse::<i64>() {
        Ok(code) => TaskState::from_code(code),
        Err(_) => TaskState::from_name(text),
    }
}

/// Best-effort integer coercion: integers pass through, finite floats are
/// truncated, numeric strings are parsed. Anything else is absent.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
