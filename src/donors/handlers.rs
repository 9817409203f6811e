use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{AddFoodRequest, RegisterDonorRequest};
use crate::{error::CoreError, models::Donor, state::AppState};

pub fn donor_routes() -> Router<AppState> {
    Router::new()
        .route("/donors", post(register_donor).get(list_donors))
        .route("/donors/:id", get(get_donor))
        .route("/donors/:id/food", post(add_food))
}

#[instrument(skip(state, payload))]
pub async fn register_donor(
    State(state): State<AppState>,
    Json(payload): Json<RegisterDonorRequest>,
) -> Result<(StatusCode, Json<Donor>), (StatusCode, String)> {
    let new = payload.validate()?;
    let donor = state.directory.create_donor(new).await?;
    info!(donor_id = %donor.id, batches = donor.current_donations.len(), "donor registered");
    Ok((StatusCode::CREATED, Json(donor)))
}

#[instrument(skip(state))]
pub async fn list_donors(
    State(state): State<AppState>,
) -> Result<Json<Vec<Donor>>, (StatusCode, String)> {
    Ok(Json(state.directory.list_donors().await?))
}

#[instrument(skip(state))]
pub async fn get_donor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Donor>, (StatusCode, String)> {
    let donor = state
        .directory
        .get_donor(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "donor", id })?;
    Ok(Json(donor))
}

/// Adds a batch to the donor and returns the donor with its updated list.
#[instrument(skip(state, payload))]
pub async fn add_food(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddFoodRequest>,
) -> Result<Json<Donor>, (StatusCode, String)> {
    let batch = payload.validate()?;
    let donor = state.ledger.add_batch(id, batch).await?;
    info!(donor_id = %id, batches = donor.current_donations.len(), "food added");
    Ok(Json(donor))
}
