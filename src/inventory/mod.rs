pub mod handlers;
pub mod ledger;

pub use ledger::InventoryLedger;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::food_routes()
}
