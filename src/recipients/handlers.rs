use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::RegisterRecipientRequest;
use crate::{error::CoreError, models::Recipient, state::AppState};

pub fn recipient_routes() -> Router<AppState> {
    Router::new()
        .route("/recipients", get(list_recipients).post(register_recipient))
        .route("/recipients/:id", get(get_recipient))
}

#[instrument(skip(state, payload))]
pub async fn register_recipient(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRecipientRequest>,
) -> Result<(StatusCode, Json<Recipient>), (StatusCode, String)> {
    let new = payload.validate()?;
    let recipient = state.directory.create_recipient(new).await?;
    info!(recipient_id = %recipient.id, daily_need = recipient.daily_need, "recipient registered");
    Ok((StatusCode::CREATED, Json(recipient)))
}

#[instrument(skip(state))]
pub async fn list_recipients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Recipient>>, (StatusCode, String)> {
    Ok(Json(state.directory.list_recipients().await?))
}

#[instrument(skip(state))]
pub async fn get_recipient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recipient>, (StatusCode, String)> {
    let recipient = state
        .directory
        .get_recipient(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "recipient", id })?;
    Ok(Json(recipient))
}
