use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{AvailableFood, Donor, FoodBatch};

/// Two quantities closer than this are treated as equal.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// How a reconciliation changed the batch it touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Consumption {
    /// The batch held exactly the requested quantity and was removed.
    Exhausted,
    /// The batch was decremented in place.
    Partial { remaining: f64 },
}

/// Per-donor batch collections.
///
/// `consume` is a single read-check-mutate unit per donor: two concurrent calls
/// against the same donor never both observe the same quantity. Calls against
/// different donors do not contend.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Appends a batch to the donor's collection and returns the updated donor.
    async fn add_batch(&self, donor_id: Uuid, batch: FoodBatch) -> Result<Donor, CoreError>;

    /// Every batch of every donor, donor-major in insertion order.
    async fn available_food(&self) -> Result<Vec<AvailableFood>, CoreError>;

    /// Deducts `quantity` from the donor's `(food_name, expiry)` batch.
    ///
    /// Fails with `BatchNotFound` and leaves the ledger untouched when the
    /// donor, the batch or enough quantity is missing.
    async fn consume(
        &self,
        donor_id: Uuid,
        food_name: &str,
        expiry: OffsetDateTime,
        quantity: f64,
    ) -> Result<Consumption, CoreError>;

    async fn reconcile(
        &self,
        donor_id: Uuid,
        food_name: &str,
        expiry: OffsetDateTime,
        quantity: f64,
    ) -> bool {
        match self.consume(donor_id, food_name, expiry, quantity).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, %donor_id, food_name, "reconcile failed");
                false
            }
        }
    }
}

pub fn check_consumable(quantity: f64) -> Result<(), CoreError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(CoreError::invalid(format!(
            "quantity to consume must be positive, got {quantity}"
        )));
    }
    Ok(())
}

/// Chooses which candidate batch absorbs `quantity`.
///
/// `candidates` holds the quantities of the batches already filtered to the
/// requested `(name, expiry)`. An exact match wins over a larger batch so no
/// zero-quantity batch is left behind.
pub fn plan_consumption(candidates: &[f64], quantity: f64) -> Option<(usize, Consumption)> {
    if let Some(i) = candidates
        .iter()
        .position(|&q| (q - quantity).abs() <= QUANTITY_EPSILON)
    {
        return Some((i, Consumption::Exhausted));
    }
    candidates
        .iter()
        .position(|&q| q > quantity)
        .map(|i| {
            (
                i,
                Consumption::Partial {
                    remaining: candidates[i] - quantity,
                },
            )
        })
}

pub fn batch_not_found(
    donor_id: Uuid,
    food_name: &str,
    expiry: OffsetDateTime,
    quantity: f64,
) -> CoreError {
    CoreError::BatchNotFound {
        donor_id,
        food_name: food_name.to_string(),
        expiry,
        quantity,
    }
}
