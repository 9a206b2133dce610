use axum::{extract::State, http::StatusCode, Json};

use crate::handlers::tasks::ErrorResponse;
use crate::state::ApiState;
use taskfleet_db::AggregateStats;

/// Get aggregate statistics
pub async fn get_statistics(
    State(state): State<ApiState>,
) -> Result<Json<AggregateStats>, (StatusCode, Json<ErrorResponse>)> {
    match state.db.get_aggregate_stats().await {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )),
    }
}
