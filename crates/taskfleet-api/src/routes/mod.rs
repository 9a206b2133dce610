use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handlers, state::ApiState};

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))

        // Fleet endpoints
        .route("/hosts", get(handlers::hosts::list_hosts))
        .route("/fleet/tasks", get(handlers::hosts::scan_fleet_tasks))

        // Per-host task endpoints
        .route("/hosts/:host/tasks", get(handlers::tasks::list_tasks))
        .route("/hosts/:host/tasks", post(handlers::tasks::create_task))
        .route("/hosts/:host/tasks/:task_name", delete(handlers::tasks::delete_task))
        .route("/hosts/:host/tasks/:task_name/run", post(handlers::tasks::run_task))
        .route("/hosts/:host/tasks/:task_name/state", post(handlers::tasks::set_task_state))
        .route(
            "/hosts/:host/tasks/:task_name/description",
            put(handlers::tasks::set_task_description),
        )

        // Log endpoints
        .route("/logs", get(handlers::logs::search_logs))
        .route("/logs/:log_id/analyze", post(handlers::logs::analyze_log))
        .route("/audit", get(handlers::logs::list_audit_logs))

        // Statistics
        .route("/stats", get(handlers::stats::get_statistics))

        // Add state
        .with_state(state)

        // Add CORS
        .layer(CorsLayer::permissive())
}
