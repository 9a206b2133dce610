use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskfleet_core::HostTarget;
use taskfleet_winrm::PsExecutor;

use crate::handlers::tasks::{task_to_view, TaskView};
use crate::state::ApiState;
use taskfleet_scheduler::{scan_fleet, DEFAULT_FAN_OUT};

#[derive(Debug, Serialize, Deserialize)]
pub struct HostResponse {
    pub name: String,
    pub address: String,
    pub group: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HostScanResponse {
    pub host: String,
    pub group: Option<String>,
    pub skipped: Option<String>,
    pub tasks: Vec<TaskView>,
}

/// List configured hosts
pub async fn list_hosts(State(state): State<ApiState>) -> Json<Vec<HostResponse>> {
    let hosts = state
        .config
        .list_hosts()
        .iter()
        .map(|h| HostResponse {
            name: h.name.clone(),
            address: h.address.clone(),
            group: h.group.clone(),
        })
        .collect();
    Json(hosts)
}

/// Scan the whole fleet. Unreachable hosts come back with zero tasks,
/// hosts with no credential come back marked skipped.
pub async fn scan_fleet_tasks(State(state): State<ApiState>) -> Json<Vec<HostScanResponse>> {
    let scans = scan_fleet(
        state.config.list_hosts(),
        |host: &HostTarget| -> Option<Arc<dyn PsExecutor>> { state.executor_for(host) },
        DEFAULT_FAN_OUT,
    )
    .await;

    let responses = scans
        .into_iter()
        .map(|scan| HostScanResponse {
            host: scan.host.name,
            group: scan.host.group,
            skipped: scan.skipped,
            tasks: scan.tasks.iter().map(|t| task_to_view(t, &state.catalog)).collect(),
        })
        .collect();
    Json(responses)
}
