use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::handlers::tasks::ErrorResponse;
use crate::state::ApiState;
use taskfleet_ai::ErrorContext;
use taskfleet_db::{AuditLog, ExecutionLog, LogFilter};

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal(e: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string() }),
    )
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub pc: Option<String>,
    pub task: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Search execution logs
pub async fn search_logs(
    State(state): State<ApiState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ExecutionLog>>, HandlerError> {
    let filter = LogFilter {
        pc_name: query.pc,
        task_name: query.task,
        since: query.since,
        until: query.until,
        limit: query.limit,
    };
    let logs = state.db.search_execution_logs(&filter).await.map_err(internal)?;
    Ok(Json(logs))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub log_id: i64,
    pub analysis: String,
}

/// Run AI analysis for one stored failure and persist the result.
pub async fn analyze_log(
    State(state): State<ApiState>,
    Path(log_id): Path<i64>,
) -> Result<Json<AnalyzeResponse>, HandlerError> {
    let log = state
        .db
        .get_execution_log(log_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse { error: "log not found".to_string() }),
            )
        })?;

    let context = ErrorContext {
        pc_name: log.pc_name,
        task_name: log.task_name,
        result_code: log.result_code,
        result_message: log.result_message,
    };
    let analysis = state.analyzer.analyze(&context).await;

    state
        .db
        .update_ai_analysis(log_id, &analysis)
        .await
        .map_err(internal)?;

    Ok(Json(AnalyzeResponse { log_id, analysis }))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// Recent audit entries
pub async fn list_audit_logs(
    State(state): State<ApiState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>, HandlerError> {
    let logs = state
        .db
        .get_audit_logs(query.limit.unwrap_or(100))
        .await
        .map_err(internal)?;
    Ok(Json(logs))
}
