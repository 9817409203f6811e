use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Donor, NewDonor, NewRecipient, Pickup, ReconciliationFailure, Recipient};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Donor and recipient records. Listing preserves insertion order.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn create_donor(&self, donor: NewDonor) -> Result<Donor, CoreError>;
    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, CoreError>;
    async fn list_donors(&self) -> Result<Vec<Donor>, CoreError>;

    async fn create_recipient(&self, recipient: NewRecipient) -> Result<Recipient, CoreError>;
    async fn get_recipient(&self, id: Uuid) -> Result<Option<Recipient>, CoreError>;
    async fn list_recipients(&self) -> Result<Vec<Recipient>, CoreError>;
}

#[async_trait]
pub trait PickupStore: Send + Sync {
    async fn insert_pickup(&self, pickup: Pickup) -> Result<Pickup, CoreError>;
    async fn get_pickup(&self, id: Uuid) -> Result<Option<Pickup>, CoreError>;
    async fn list_pickups(&self) -> Result<Vec<Pickup>, CoreError>;

    /// Moves a pickup from any non-complete status to `Complete`.
    ///
    /// Exactly one caller wins per pickup; the rest get `AlreadyComplete`.
    async fn claim_completion(&self, id: Uuid, at: OffsetDateTime) -> Result<Pickup, CoreError>;

    /// Attaches the reconciliation failures of a completion to the record.
    async fn record_failures(
        &self,
        id: Uuid,
        failures: &[ReconciliationFailure],
    ) -> Result<Pickup, CoreError>;
}
