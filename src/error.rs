use axum::http::StatusCode;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

/// Errors raised by the allocation, reconciliation and pickup operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input rejected at the boundary (empty match list,
    /// non-positive quantities, unknown ids).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// A pickup can be completed once.
    #[error("pickup {0} is already complete")]
    AlreadyComplete(Uuid),

    /// No batch on the donor matches `(food_name, expiry)` with enough quantity.
    #[error("no batch of {food_name:?} expiring {expiry} on donor {donor_id} holds {quantity}")]
    BatchNotFound {
        donor_id: Uuid,
        food_name: String,
        expiry: OffsetDateTime,
        quantity: f64,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A detached completion task panicked or was cancelled by shutdown.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::AlreadyComplete(_) | CoreError::BatchNotFound { .. } => StatusCode::CONFLICT,
            CoreError::Database(_) | CoreError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for (StatusCode, String) {
    fn from(e: CoreError) -> Self {
        let status = e.status();
        if status.is_server_error() {
            error!(error = %e, "request failed");
            return (status, "internal error".into());
        }
        (status, e.to_string())
    }
}
