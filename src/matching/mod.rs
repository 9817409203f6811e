pub mod engine;
pub mod handlers;
pub mod services;

pub use engine::allocate;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::match_routes()
}
