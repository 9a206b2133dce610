use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::state::ApiState;
use taskfleet_core::display::{format_datetime, format_trigger, result_info, state_info};
use taskfleet_core::{ErrorCatalog, TaskRecord, TaskSpec};
use taskfleet_scheduler::{discover, TaskAdmin};
use taskfleet_winrm::PsExecutor;

/// Display-ready view of one task, with state and result already mapped
/// through the presentation helpers.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskView {
    pub task_name: String,
    pub task_path: String,
    pub state: String,
    pub state_icon: String,
    pub result: String,
    pub result_icon: String,
    pub next_run: String,
    pub last_run: String,
    pub trigger: String,
    pub description: Option<String>,
    pub author: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetStateRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetDescriptionRequest {
    pub description: String,
}

pub fn task_to_view(task: &TaskRecord, catalog: &ErrorCatalog) -> TaskView {
    let state = state_info(task.state);
    let result = result_info(task, catalog);
    TaskView {
        task_name: task.task_name.clone(),
        task_path: task.task_path.clone(),
        state: state.label.to_string(),
        state_icon: state.icon.to_string(),
        result: result.label,
        result_icon: result.icon.to_string(),
        next_run: format_datetime(task.next_run_time),
        last_run: format_datetime(task.last_run_time),
        trigger: task
            .trigger_raw
            .as_deref()
            .map(format_trigger)
            .unwrap_or_else(|| "Not set".to_string()),
        description: task.description.clone(),
        author: task.author.clone(),
    }
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn not_found(what: &str) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse { error: format!("{} not found", what) }),
    )
}

fn no_credential(host: &str) -> HandlerError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse { error: format!("no credential configured for host {}", host) }),
    )
}

fn internal(e: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string() }),
    )
}

fn resolve_executor(
    state: &ApiState,
    host_name: &str,
) -> Result<std::sync::Arc<dyn PsExecutor>, HandlerError> {
    let host = state.config.host(host_name).ok_or_else(|| not_found("host"))?;
    state.executor_for(host).ok_or_else(|| no_credential(host_name))
}

/// The acting user for audit purposes; the dashboard forwards its login
/// in this header.
fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get("x-user")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("api")
        .to_string()
}

/// List tasks on one host
pub async fn list_tasks(
    State(state): State<ApiState>,
    Path(host): Path<String>,
) -> Result<Json<Vec<TaskView>>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let tasks = discover(executor.as_ref()).await;
    let views = tasks.iter().map(|t| task_to_view(t, &state.catalog)).collect();
    Ok(Json(views))
}

/// Create a task
pub async fn create_task(
    State(state): State<ApiState>,
    Path(host): Path<String>,
    headers: HeaderMap,
    Json(spec): Json<TaskSpec>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let actor = actor_from(&headers);
    let admin = TaskAdmin::new(executor.as_ref(), state.db.as_ref(), &actor);

    let outcome = admin.create(&spec).await.map_err(internal)?;
    Ok(Json(MutationResponse { success: outcome.success, message: outcome.message }))
}

/// Delete a task
pub async fn delete_task(
    State(state): State<ApiState>,
    Path((host, task_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let actor = actor_from(&headers);
    let admin = TaskAdmin::new(executor.as_ref(), state.db.as_ref(), &actor);

    let outcome = admin.delete(&task_name).await.map_err(internal)?;
    Ok(Json(MutationResponse { success: outcome.success, message: outcome.message }))
}

/// Run a task immediately
pub async fn run_task(
    State(state): State<ApiState>,
    Path((host, task_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let actor = actor_from(&headers);
    let admin = TaskAdmin::new(executor.as_ref(), state.db.as_ref(), &actor);

    let outcome = admin.run_now(&task_name).await.map_err(internal)?;
    Ok(Json(MutationResponse { success: outcome.success, message: outcome.message }))
}

/// Enable or disable a task
pub async fn set_task_state(
    State(state): State<ApiState>,
    Path((host, task_name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<SetStateRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let actor = actor_from(&headers);
    let admin = TaskAdmin::new(executor.as_ref(), state.db.as_ref(), &actor);

    let outcome = admin
        .set_enabled(&task_name, payload.enabled)
        .await
        .map_err(internal)?;
    Ok(Json(MutationResponse { success: outcome.success, message: outcome.message }))
}

/// Update a task's description
pub async fn set_task_description(
    State(state): State<ApiState>,
    Path((host, task_name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<SetDescriptionRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let executor = resolve_executor(&state, &host)?;
    let actor = actor_from(&headers);
    let admin = TaskAdmin::new(executor.as_ref(), state.db.as_ref(), &actor);

    let outcome = admin
        .set_description(&task_name, &payload.description)
        .await
        .map_err(internal)?;
    Ok(Json(MutationResponse { success: outcome.success, message: outcome.message }))
}
