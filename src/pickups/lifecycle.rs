//! Pickup state machine: `pending -> complete`, once.
//!
//! Completion first claims the transition in the store, so concurrent
//! completion requests for one pickup reconcile at most once. Each match is
//! then deducted from its source batch; a failed deduction is recorded on the
//! pickup and returned, it never undoes the completion.
//!
//! The claim and every deduction run on a spawned task. Dropping the caller
//! (a disconnected HTTP client) cannot leave a claimed pickup half reconciled.

use time::OffsetDateTime;
use tracing::{error, info, instrument, warn, Instrument};
use uuid::Uuid;

use super::route::{build_stops, AddressBook};
use crate::error::CoreError;
use crate::models::{MatchResult, Pickup, ReconciliationFailure};
use crate::state::AppState;
use crate::validate;

#[derive(Debug, Clone)]
pub struct Completion {
    pub pickup: Pickup,
    pub failures: Vec<ReconciliationFailure>,
}

/// Rejects unusable matches and truncates the expiry the way stored batches are.
fn normalize_match(m: &mut MatchResult) -> Result<(), CoreError> {
    if !m.quantity_matched.is_finite() || m.quantity_matched <= 0.0 {
        return Err(CoreError::invalid(format!(
            "match of {:?} for recipient {} has non-positive quantity {}",
            m.food_name, m.recipient_id, m.quantity_matched
        )));
    }
    if m.food_name.trim().is_empty() {
        return Err(CoreError::invalid("match has an empty food name"));
    }
    m.expiry_date = validate::expiry(m.expiry_date)?;
    Ok(())
}

/// Builds the route for `matches` and stores a pending pickup.
#[instrument(skip(st, matches), fields(matches = matches.len()))]
pub async fn create_pickup(st: &AppState, mut matches: Vec<MatchResult>) -> Result<Pickup, CoreError> {
    if matches.is_empty() {
        return Err(CoreError::invalid("a pickup needs at least one match"));
    }
    for m in &mut matches {
        normalize_match(m)?;
    }

    let book = AddressBook::load(st.directory.as_ref(), &matches).await?;
    let stops = build_stops(&matches, &book)?;
    let pickup = st.pickups.insert_pickup(Pickup::pending(matches, stops)).await?;

    info!(pickup_id = %pickup.id, stops = pickup.stops.len(), "pickup created");
    Ok(pickup)
}

/// Marks a pickup complete and deducts every match from the inventory.
#[instrument(skip(st))]
pub async fn complete_pickup(st: &AppState, id: Uuid) -> Result<Completion, CoreError> {
    let st = st.clone();
    tokio::spawn(async move { run_completion(&st, id).await }.in_current_span()).await?
}

async fn run_completion(st: &AppState, id: Uuid) -> Result<Completion, CoreError> {
    let mut pickup = st
        .pickups
        .claim_completion(id, OffsetDateTime::now_utc())
        .await?;

    let mut failures = Vec::new();
    for m in &pickup.matches {
        if let Err(e) = st
            .ledger
            .consume(m.donor_id, &m.food_name, m.expiry_date, m.quantity_matched)
            .await
        {
            warn!(
                pickup_id = %id,
                donor_id = %m.donor_id,
                food = %m.food_name,
                quantity = m.quantity_matched,
                error = %e,
                "reconciliation failed"
            );
            failures.push(ReconciliationFailure {
                item: m.clone(),
                reason: e.to_string(),
            });
        }
    }

    if !failures.is_empty() {
        match st.pickups.record_failures(id, &failures).await {
            Ok(stored) => pickup = stored,
            Err(e) => {
                error!(pickup_id = %id, error = %e, "could not store reconciliation failures");
                pickup.reconciliation_failures = failures.clone();
            }
        }
    }

    info!(
        pickup_id = %id,
        matches = pickup.matches.len(),
        failed = failures.len(),
        "pickup completed"
    );
    Ok(Completion { pickup, failures })
}
