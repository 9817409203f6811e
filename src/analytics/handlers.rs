use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::services::current_summary;
use super::summary::Summary;
use crate::state::AppState;

pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/analytics/summary", get(get_summary))
}

/// Dashboard figures: donor participation, share of need, matched totals.
#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
) -> Result<Json<Summary>, (axum::http::StatusCode, String)> {
    Ok(Json(current_summary(&state).await?))
}
