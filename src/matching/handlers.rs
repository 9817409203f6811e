use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use super::services::run_matching;
use crate::{models::MatchResult, state::AppState};

pub fn match_routes() -> Router<AppState> {
    Router::new().route("/matches/run", post(run_matchmaker))
}

/// Proposes matches for every recipient against all available food.
/// Nothing is reserved; proposals only become binding through a pickup.
#[instrument(skip(state))]
pub async fn run_matchmaker(
    State(state): State<AppState>,
) -> Result<Json<Vec<MatchResult>>, (axum::http::StatusCode, String)> {
    let matches = run_matching(&state).await?;
    Ok(Json(matches))
}
