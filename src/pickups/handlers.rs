use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{CompletePickupResponse, CreatePickupRequest};
use super::lifecycle::{complete_pickup, create_pickup};
use crate::{error::CoreError, models::Pickup, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/pickups", get(list_pickups))
        .route("/pickups/:id", get(get_pickup))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/pickups", post(create))
        .route("/pickups/:id/complete", post(complete))
}

#[instrument(skip(state))]
pub async fn list_pickups(
    State(state): State<AppState>,
) -> Result<Json<Vec<Pickup>>, (StatusCode, String)> {
    Ok(Json(state.pickups.list_pickups().await?))
}

#[instrument(skip(state))]
pub async fn get_pickup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Pickup>, (StatusCode, String)> {
    let pickup = state
        .pickups
        .get_pickup(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "pickup", id })?;
    Ok(Json(pickup))
}

/// POST /pickups { matches: [...] }
#[instrument(skip(state, body), fields(matches = body.matches.len()))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreatePickupRequest>,
) -> Result<(StatusCode, Json<Pickup>), (StatusCode, String)> {
    let pickup = create_pickup(&state, body.matches).await?;
    Ok((StatusCode::CREATED, Json(pickup)))
}

/// POST /pickups/:id/complete
#[instrument(skip(state))]
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletePickupResponse>, (StatusCode, String)> {
    let done = complete_pickup(&state, id).await?;
    if !done.failures.is_empty() {
        warn!(pickup_id = %id, failed = done.failures.len(), "pickup completed with warnings");
    }
    Ok(Json(CompletePickupResponse::new(done.pickup, done.failures)))
}
