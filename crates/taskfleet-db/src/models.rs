use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded task execution result, as captured by a fleet sweep or a
/// manual run. `ai_analysis` is filled in later, if at all.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionLog {
    pub log_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub pc_name: String,
    pub task_path: String,
    pub task_name: String,
    pub result_code: Option<i64>,
    pub result_message: String,
    pub ai_analysis: Option<String>,
}

/// Audit trail entry for a successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub audit_id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_identifier: String,
    pub action_type: String,
    pub target_pc: String,
    pub target_task: String,
    pub details: String,
}

/// Search criteria for execution logs. Every field is optional; name
/// fields match as substrings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub pc_name: Option<String>,
    pub task_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_logs: i64,
    pub failed_logs: i64,
    pub analyzed_logs: i64,
    pub distinct_hosts: i64,
    pub audit_entries: i64,
}
