use serde::{Deserialize, Serialize};

use crate::models::{MatchResult, Pickup, ReconciliationFailure};

/// Request body for creating a pickup from selected matches.
#[derive(Debug, Deserialize)]
pub struct CreatePickupRequest {
    pub matches: Vec<MatchResult>,
}

/// Response to a completion request. `warning` is set when some matches could
/// not be deducted from inventory.
#[derive(Debug, Serialize)]
pub struct CompletePickupResponse {
    pub pickup: Pickup,
    pub failures: Vec<ReconciliationFailure>,
    pub warning: Option<String>,
}

impl CompletePickupResponse {
    pub fn new(pickup: Pickup, failures: Vec<ReconciliationFailure>) -> Self {
        let warning = (!failures.is_empty()).then(|| {
            format!(
                "pickup marked complete but {} of {} items could not be deducted from inventory",
                failures.len(),
                pickup.matches.len()
            )
        });
        Self {
            pickup,
            failures,
            warning,
        }
    }
}
