use crate::{
    models::{AggregateStats, AuditLog, ExecutionLog, LogFilter},
    Result,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use taskfleet_core::{AuditEntry, AuditSink};

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create new database connection. The file is created if missing;
    /// SQLite serializes writes anyway, so one connection is enough.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_logs (
                log_id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                pc_name TEXT NOT NULL,
                task_path TEXT NOT NULL DEFAULT '\',
                task_name TEXT NOT NULL,
                result_code INTEGER,
                result_message TEXT NOT NULL,
                ai_analysis TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                user_identifier TEXT NOT NULL,
                action_type TEXT NOT NULL,
                target_pc TEXT NOT NULL,
                target_task TEXT NOT NULL,
                details TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_logs_pc_task \
             ON execution_logs(pc_name, task_name)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_execution_logs_recorded_at \
             ON execution_logs(recorded_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp \
             ON audit_logs(timestamp DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Execution Log Operations
    // ========================================================================

    /// Record one execution result, returning the new log id.
    pub async fn add_execution_log(
        &self,
        pc_name: &str,
        task_path: &str,
        task_name: &str,
        result_code: Option<i64>,
        result_message: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO execution_logs (
                recorded_at, pc_name, task_path, task_name,
                result_code, result_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Utc::now())
        .bind(pc_name)
        .bind(task_path)
        .bind(task_name)
        .bind(result_code)
        .bind(result_message)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Search execution logs, newest first. Name filters are substring
    /// matches; absent criteria match everything.
    pub async fn search_execution_logs(&self, filter: &LogFilter) -> Result<Vec<ExecutionLog>> {
        let logs = sqlx::query_as::<_, ExecutionLog>(
            r#"
            SELECT * FROM execution_logs
            WHERE (?1 IS NULL OR pc_name LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR task_name LIKE '%' || ?2 || '%')
              AND (?3 IS NULL OR recorded_at >= ?3)
              AND (?4 IS NULL OR recorded_at <= ?4)
            ORDER BY recorded_at DESC, log_id DESC
            LIMIT ?5
            "#,
        )
        .bind(&filter.pc_name)
        .bind(&filter.task_name)
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.limit.unwrap_or(200))
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Get one execution log by id.
    pub async fn get_execution_log(&self, log_id: i64) -> Result<Option<ExecutionLog>> {
        let log = sqlx::query_as::<_, ExecutionLog>(
            "SELECT * FROM execution_logs WHERE log_id = ?1",
        )
        .bind(log_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    /// The most recent log for one task on one host, used by the sweep
    /// worker to avoid re-recording a failure it already knows about.
    pub async fn latest_execution_log(
        &self,
        pc_name: &str,
        task_name: &str,
    ) -> Result<Option<ExecutionLog>> {
        let log = sqlx::query_as::<_, ExecutionLog>(
            r#"
            SELECT * FROM execution_logs
            WHERE pc_name = ?1 AND task_name = ?2
            ORDER BY recorded_at DESC, log_id DESC
            LIMIT 1
            "#,
        )
        .bind(pc_name)
        .bind(task_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(log)
    }

    /// Attach an AI analysis to an existing log entry.
    pub async fn update_ai_analysis(&self, log_id: i64, analysis: &str) -> Result<()> {
        let result = sqlx::query("UPDATE execution_logs SET ai_analysis = ?1 WHERE log_id = ?2")
            .bind(analysis)
            .bind(log_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::LogNotFound(log_id));
        }
        Ok(())
    }

    // ========================================================================
    // Audit Operations
    // ========================================================================

    /// Append an audit entry, stamped with the current time.
    pub async fn add_audit_log(&self, entry: &AuditEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                timestamp, user_identifier, action_type,
                target_pc, target_task, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Utc::now())
        .bind(&entry.user_identifier)
        .bind(entry.action_type.as_str())
        .bind(&entry.target_pc)
        .bind(&entry.target_task)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Recent audit entries, newest first.
    pub async fn get_audit_logs(&self, limit: i64) -> Result<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY timestamp DESC, audit_id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Get aggregate statistics
    pub async fn get_aggregate_stats(&self) -> Result<AggregateStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total_logs,
                COUNT(CASE WHEN result_code IS NOT NULL AND result_code != 0 THEN 1 END)
                    as failed_logs,
                COUNT(ai_analysis) as analyzed_logs,
                COUNT(DISTINCT pc_name) as distinct_hosts
            FROM execution_logs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let audit_row = sqlx::query("SELECT COUNT(*) as audit_entries FROM audit_logs")
            .fetch_one(&self.pool)
            .await?;

        Ok(AggregateStats {
            total_logs: row.get("total_logs"),
            failed_logs: row.get("failed_logs"),
            analyzed_logs: row.get("analyzed_logs"),
            distinct_hosts: row.get("distinct_hosts"),
            audit_entries: audit_row.get("audit_entries"),
        })
    }
}

#[async_trait]
impl AuditSink for Database {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()> {
        self.add_audit_log(&entry).await?;
        Ok(())
    }
}
