use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{models::AvailableFood, state::AppState};

pub fn food_routes() -> Router<AppState> {
    Router::new().route("/food/available", get(list_available_food))
}

/// Every batch currently held by any donor, annotated with the donor.
#[instrument(skip(state))]
pub async fn list_available_food(
    State(state): State<AppState>,
) -> Result<Json<Vec<AvailableFood>>, (axum::http::StatusCode, String)> {
    let food = state.ledger.available_food().await?;
    Ok(Json(food))
}
