//! Task result code catalog.
//!
//! Windows task scheduler reports run outcomes as integer codes, some of
//! them in the 0x8004xxxx/0x0004xxxx scheduler range. The catalog maps codes
//! to operator-facing messages and knows which codes indicate a timeout. It
//! is backed by a user-editable JSON file; a missing or broken file falls
//! back to the compiled-in default set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

const TASK_SCHEDULER_RANGE_START: i64 = 0x0004_1300;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeoutStep {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimeoutSolutions {
    pub title: String,
    pub steps: Vec<TimeoutStep>,
}

/// On-disk shape of the catalog file. Codes are string keys, optionally in
/// `0x` hex form, grouped into named categories.
#[derive(Debug, Serialize, Deserialize, Default)]
struct CatalogFile {
    #[serde(default)]
    error_codes: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    timeout_error_codes: Vec<String>,
    #[serde(default)]
    timeout_solutions: TimeoutSolutions,
}

#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    messages: HashMap<i64, String>,
    timeout_codes: Vec<i64>,
    timeout_solutions: TimeoutSolutions,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        let mut messages = HashMap::new();
        for (code, message) in [
            (1, "General error"),
            (2, "Invalid parameter"),
            (3, "File not found"),
            (4, "Access denied"),
            (5, "Timeout"),
            (6, "Out of memory"),
            (7, "Network error"),
            (8, "Insufficient privileges"),
            (9, "System error"),
            (10, "Service error"),
            (124, "Timeout error"),
            (258, "Timeout error"),
            (1460, "Timeout error"),
            (1461, "Timeout error"),
            (0x0004_1301, "Task is currently running"),
            (0x0004_1303, "Task has not yet run"),
            (0x0004_1306, "Task was terminated due to a timeout"),
            (0x0004_1324, "Task run failed due to a constraint"),
            (0x0004_1325, "Task is queued for execution"),
            (0x0004_1326, "Task is disabled"),
            (0x8007_0002, "The system cannot find the file specified"),
        ] {
            messages.insert(code, message.to_string());
        }

        Self {
            messages,
            timeout_codes: vec![0x0004_1306, 0x0004_1324, 124, 258, 1460, 1461],
            timeout_solutions: default_timeout_solutions(),
        }
    }
}

impl ErrorCatalog {
    /// Load the catalog from `path`. A missing file or a file that fails to
    /// parse logs a warning and yields the default set; individual bad code
    /// keys are skipped, not fatal.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Error code catalog not readable at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let file: CatalogFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Error code catalog at {} is malformed: {}", path.display(), e);
                return Self::default();
            }
        };

        let mut messages = HashMap::new();
        for (category, codes) in &file.error_codes {
            for (key, message) in codes {
                match parse_code(key) {
                    Some(code) => {
                        messages.insert(code, message.clone());
                    }
                    None => {
                        tracing::warn!("Skipping invalid code {:?} in category {}", key, category);
                    }
                }
            }
        }

        let timeout_codes = file
            .timeout_error_codes
            .iter()
            .filter_map(|key| {
                let parsed = parse_code(key);
                if parsed.is_none() {
                    tracing::warn!("Skipping invalid timeout code {:?}", key);
                }
                parsed
            })
            .collect();

        tracing::info!("Loaded {} error codes from {}", messages.len(), path.display());

        Self {
            messages,
            timeout_codes,
            timeout_solutions: file.timeout_solutions,
        }
    }

    /// Persist the catalog, re-hexing codes in the scheduler range so the
    /// file stays readable next to Microsoft documentation.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut general = HashMap::new();
        let mut task_scheduler = HashMap::new();
        for (code, message) in &self.messages {
            if *code >= TASK_SCHEDULER_RANGE_START {
                task_scheduler.insert(format!("0x{:08X}", code), message.clone());
            } else {
                general.insert(code.to_string(), message.clone());
            }
        }

        let mut error_codes = HashMap::new();
        error_codes.insert("general".to_string(), general);
        error_codes.insert("task_scheduler".to_string(), task_scheduler);

        let file = CatalogFile {
            error_codes,
            timeout_error_codes: self
                .timeout_codes
                .iter()
                .map(|code| {
                    if *code >= TASK_SCHEDULER_RANGE_START {
                        format!("0x{:08X}", code)
                    } else {
                        code.to_string()
                    }
                })
                .collect(),
            timeout_solutions: self.timeout_solutions.clone(),
        };

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn message_for(&self, code: i64) -> String {
        self.messages
            .get(&code)
            .cloned()
            .unwrap_or_else(|| format!("Error ({})", code))
    }

    pub fn is_timeout(&self, code: i64) -> bool {
        self.timeout_codes.contains(&code)
    }

    pub fn timeout_solutions(&self) -> &TimeoutSolutions {
        &self.timeout_solutions
    }

    pub fn add_code(&mut self, key: &str, message: impl Into<String>) -> bool {
        match parse_code(key) {
            Some(code) => {
                self.messages.insert(code, message.into());
                true
            }
            None => false,
        }
    }
}

/// Parse a catalog key, accepting decimal and `0x` hex forms.
fn parse_code(key: &str) -> Option<i64> {
    let key = key.trim();
    if let Some(hex) = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        key.parse().ok()
    }
}

fn default_timeout_solutions() -> TimeoutSolutions {
    TimeoutSolutions {
        title: "Resolving timeout errors".to_string(),
        steps: vec![
            TimeoutStep {
                title: "Extend the task's execution time limit".to_string(),
                description: "Open the task's properties in Task Scheduler and raise the \
                              'Stop the task if it runs longer than' setting."
                    .to_string(),
            },
            TimeoutStep {
                title: "Investigate external factors".to_string(),
                description: "Check network connectivity, the response time of target files \
                              and servers, and host CPU/memory usage."
                    .to_string(),
            },
            TimeoutStep {
                title: "Optimize the task".to_string(),
                description: "Review the workload, adjust batch sizes, and consider \
                              parallelizing long-running steps."
                    .to_string(),
            },
            TimeoutStep {
                title: "Check the logs".to_string(),
                description: "Inspect Event Viewer and application logs for detailed error \
                              information."
                    .to_string(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_codes_normalize_to_decimal() {
        assert_eq!(parse_code("0x00041306"), Some(0x41306));
        assert_eq!(parse_code("258"), Some(258));
        assert_eq!(parse_code("garbage"), None);
    }

    #[test]
    fn default_catalog_knows_scheduler_codes() {
        let catalog = ErrorCatalog::default();
        assert_eq!(catalog.message_for(0x41306), "Task was terminated due to a timeout");
        assert!(catalog.is_timeout(0x41306));
        assert!(catalog.is_timeout(258));
        assert!(!catalog.is_timeout(0));
    }

    #[test]
    fn unknown_code_gets_generic_message() {
        let catalog = ErrorCatalog::default();
        assert_eq!(catalog.message_for(42424242), "Error (42424242)");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let catalog = ErrorCatalog::load("/nonexistent/error_codes.json");
        assert_eq!(catalog.message_for(1), "General error");
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_codes.json");

        let mut catalog = ErrorCatalog::default();
        assert!(catalog.add_code("0x00041307", "Custom scheduler code"));
        assert!(!catalog.add_code("not-a-code", "ignored"));
        catalog.save(&path).unwrap();

        let reloaded = ErrorCatalog::load(&path);
        assert_eq!(reloaded.message_for(0x41307), "Custom scheduler code");
        assert!(reloaded.is_timeout(0x41306));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error_codes.json");
        std::fs::write(&path, "{ not json").unwrap();

        let catalog = ErrorCatalog::load(&path);
        assert_eq!(catalog.message_for(1), "General error");
    }
}
