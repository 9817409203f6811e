use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{Directory, PickupStore};
use crate::error::CoreError;
use crate::inventory::ledger::{
    batch_not_found, check_consumable, plan_consumption, Consumption, InventoryLedger,
};
use crate::models::{
    AvailableFood, Donor, FoodBatch, NewDonor, NewRecipient, Pickup, PickupStatus,
    ReconciliationFailure, Recipient,
};

/// Each donor sits behind its own lock so reconciliation on one donor
/// never waits on another.
type DonorSlot = (Uuid, Arc<Mutex<Donor>>);

/// Process-local store used for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    donors: RwLock<Vec<DonorSlot>>,
    recipients: RwLock<Vec<Recipient>>,
    pickups: RwLock<Vec<Pickup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn donor_slot(&self, id: Uuid) -> Option<Arc<Mutex<Donor>>> {
        self.donors
            .read()
            .await
            .iter()
            .find(|(donor_id, _)| *donor_id == id)
            .map(|(_, slot)| Arc::clone(slot))
    }

    async fn donor_slots(&self) -> Vec<Arc<Mutex<Donor>>> {
        self.donors
            .read()
            .await
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect()
    }
}

fn ensure_unique(donor: &Donor, batch: &FoodBatch) -> Result<(), CoreError> {
    let clash = donor
        .current_donations
        .iter()
        .any(|b| b.name == batch.name && b.expiry_date == batch.expiry_date);
    if clash {
        return Err(CoreError::invalid(format!(
            "donor {} already holds a batch of {:?} with this expiry",
            donor.id, batch.name
        )));
    }
    Ok(())
}

#[async_trait]
impl Directory for MemoryStore {
    async fn create_donor(&self, new: NewDonor) -> Result<Donor, CoreError> {
        let mut donor = Donor {
            id: Uuid::new_v4(),
            name: new.name,
            address: new.address,
            phone: new.phone,
            current_donations: Vec::with_capacity(new.current_donations.len()),
        };
        for batch in new.current_donations {
            ensure_unique(&donor, &batch)?;
            donor.current_donations.push(batch);
        }
        self.donors
            .write()
            .await
            .push((donor.id, Arc::new(Mutex::new(donor.clone()))));
        Ok(donor)
    }

    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, CoreError> {
        match self.donor_slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_donors(&self) -> Result<Vec<Donor>, CoreError> {
        let mut out = Vec::new();
        for slot in self.donor_slots().await {
            out.push(slot.lock().await.clone());
        }
        Ok(out)
    }

    async fn create_recipient(&self, new: NewRecipient) -> Result<Recipient, CoreError> {
        let recipient = Recipient {
            id: Uuid::new_v4(),
            name: new.name,
            address: new.address,
            phone: new.phone,
            daily_need: new.daily_need,
        };
        self.recipients.write().await.push(recipient.clone());
        Ok(recipient)
    }

    async fn get_recipient(&self, id: Uuid) -> Result<Option<Recipient>, CoreError> {
        Ok(self
            .recipients
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_recipients(&self) -> Result<Vec<Recipient>, CoreError> {
        Ok(self.recipients.read().await.clone())
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn add_batch(&self, donor_id: Uuid, batch: FoodBatch) -> Result<Donor, CoreError> {
        let slot = self.donor_slot(donor_id).await.ok_or(CoreError::NotFound {
            entity: "donor",
            id: donor_id,
        })?;
        let mut donor = slot.lock().await;
        ensure_unique(&donor, &batch)?;
        donor.current_donations.push(batch);
        Ok(donor.clone())
    }

    async fn available_food(&self) -> Result<Vec<AvailableFood>, CoreError> {
        let mut out = Vec::new();
        for slot in self.donor_slots().await {
            let donor = slot.lock().await;
            out.extend(
                donor
                    .current_donations
                    .iter()
                    .map(|batch| AvailableFood::from_batch(&donor, batch)),
            );
        }
        Ok(out)
    }

    async fn consume(
        &self,
        donor_id: Uuid,
        food_name: &str,
        expiry: OffsetDateTime,
        quantity: f64,
    ) -> Result<Consumption, CoreError> {
        check_consumable(quantity)?;
        let slot = self
            .donor_slot(donor_id)
            .await
            .ok_or_else(|| batch_not_found(donor_id, food_name, expiry, quantity))?;

        // Held across lookup, decision and mutation.
        let mut donor = slot.lock().await;
        let positions: Vec<usize> = donor
            .current_donations
            .iter()
            .enumerate()
            .filter(|(_, b)| b.name == food_name && b.expiry_date == expiry)
            .map(|(i, _)| i)
            .collect();
        let quantities: Vec<f64> = positions
            .iter()
            .map(|&i| donor.current_donations[i].quantity)
            .collect();

        let (pick, consumption) = plan_consumption(&quantities, quantity)
            .ok_or_else(|| batch_not_found(donor_id, food_name, expiry, quantity))?;
        let index = positions[pick];
        match consumption {
            Consumption::Exhausted => {
                donor.current_donations.remove(index);
            }
            Consumption::Partial { remaining } => {
                donor.current_donations[index].quantity = remaining;
            }
        }
        debug!(%donor_id, food_name, quantity, ?consumption, "batch consumed");
        Ok(consumption)
    }
}

#[async_trait]
impl PickupStore for MemoryStore {
    async fn insert_pickup(&self, pickup: Pickup) -> Result<Pickup, CoreError> {
        self.pickups.write().await.push(pickup.clone());
        Ok(pickup)
    }

    async fn get_pickup(&self, id: Uuid) -> Result<Option<Pickup>, CoreError> {
        Ok(self.pickups.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn list_pickups(&self) -> Result<Vec<Pickup>, CoreError> {
        Ok(self.pickups.read().await.clone())
    }

    async fn claim_completion(&self, id: Uuid, at: OffsetDateTime) -> Result<Pickup, CoreError> {
        let mut pickups = self.pickups.write().await;
        let pickup = pickups
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CoreError::NotFound {
                entity: "pickup",
                id,
            })?;
        if pickup.is_complete() {
            return Err(CoreError::AlreadyComplete(id));
        }
        pickup.status = PickupStatus::Complete;
        pickup.completed_at = Some(at);
        Ok(pickup.clone())
    }

    async fn record_failures(
        &self,
        id: Uuid,
        failures: &[ReconciliationFailure],
    ) -> Result<Pickup, CoreError> {
        let mut pickups = self.pickups.write().await;
        let pickup = pickups
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CoreError::NotFound {
                entity: "pickup",
                id,
            })?;
        pickup.reconciliation_failures = failures.to_vec();
        Ok(pickup.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn batch(name: &str, quantity: f64, expiry: OffsetDateTime) -> FoodBatch {
        FoodBatch {
            name: name.into(),
            quantity,
            unit: "kg".into(),
            expiry_date: expiry,
        }
    }

    async fn donor_with(store: &MemoryStore, batches: Vec<FoodBatch>) -> Donor {
        store
            .create_donor(NewDonor {
                name: "Corner Bakery".into(),
                address: "12 Baker St".into(),
                phone: "555-0100".into(),
                current_donations: batches,
            })
            .await
            .unwrap()
    }

    const EXPIRY: OffsetDateTime = datetime!(2026-10-25 0:00 UTC);

    #[tokio::test]
    async fn consuming_exact_quantity_removes_batch() {
        let store = MemoryStore::new();
        let donor = donor_with(&store, vec![batch("Bread", 5.0, EXPIRY)]).await;

        assert!(store.reconcile(donor.id, "Bread", EXPIRY, 5.0).await);

        let after = store.get_donor(donor.id).await.unwrap().unwrap();
        assert!(after.current_donations.is_empty());
    }

    #[tokio::test]
    async fn consuming_part_leaves_remainder() {
        let store = MemoryStore::new();
        let donor = donor_with(&store, vec![batch("Bread", 5.0, EXPIRY)]).await;

        let c = store.consume(donor.id, "Bread", EXPIRY, 3.0).await.unwrap();
        assert_eq!(c, Consumption::Partial { remaining: 2.0 });

        let after = store.get_donor(donor.id).await.unwrap().unwrap();
        assert_eq!(after.current_donations, vec![batch("Bread", 2.0, EXPIRY)]);
    }

    #[tokio::test]
    async fn overdraw_fails_and_leaves_batch_unchanged() {
        let store = MemoryStore::new();
        let donor = donor_with(&store, vec![batch("Bread", 5.0, EXPIRY)]).await;

        let err = store.consume(donor.id, "Bread", EXPIRY, 6.0).await.unwrap_err();
        assert!(matches!(err, CoreError::BatchNotFound { .. }));
        assert!(!store.reconcile(donor.id, "Bread", EXPIRY, 6.0).await);

        let after = store.get_donor(donor.id).await.unwrap().unwrap();
        assert_eq!(after.current_donations, vec![batch("Bread", 5.0, EXPIRY)]);
    }

    #[tokio::test]
    async fn batches_with_other_expiry_or_donor_are_never_touched() {
        let store = MemoryStore::new();
        let later = datetime!(2026-10-30 0:00 UTC);
        let donor = donor_with(
            &store,
            vec![batch("Bread", 5.0, EXPIRY), batch("Bread", 9.0, later)],
        )
        .await;

        assert!(!store.reconcile(donor.id, "Bread", EXPIRY, 7.0).await);
        assert!(!store.reconcile(Uuid::new_v4(), "Bread", EXPIRY, 1.0).await);
        assert!(store.reconcile(donor.id, "Bread", later, 7.0).await);

        let after = store.get_donor(donor.id).await.unwrap().unwrap();
        assert_eq!(
            after.current_donations,
            vec![batch("Bread", 5.0, EXPIRY), batch("Bread", 2.0, later)]
        );
    }

    #[tokio::test]
    async fn duplicate_batch_identity_is_rejected() {
        let store = MemoryStore::new();
        let donor = donor_with(&store, vec![batch("Milk", 3.0, EXPIRY)]).await;

        let err = store
            .add_batch(donor.id, batch("Milk", 1.0, EXPIRY))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let missing = store
            .add_batch(Uuid::new_v4(), batch("Milk", 1.0, EXPIRY))
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { entity: "donor", .. }));
    }

    #[tokio::test]
    async fn available_food_flattens_in_insertion_order() {
        let store = MemoryStore::new();
        let first = donor_with(&store, vec![batch("Bread", 5.0, EXPIRY)]).await;
        let second = donor_with(&store, vec![batch("Rice", 2.0, EXPIRY)]).await;
        store
            .add_batch(first.id, batch("Soup", 1.5, EXPIRY))
            .await
            .unwrap();

        let food = store.available_food().await.unwrap();
        let names: Vec<(Uuid, &str)> = food.iter().map(|f| (f.donor_id, f.name.as_str())).collect();
        assert_eq!(
            names,
            vec![(first.id, "Bread"), (first.id, "Soup"), (second.id, "Rice")]
        );
        assert_eq!(food[0].donor_name, "Corner Bakery");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reconciles_never_overdraw() {
        let store = Arc::new(MemoryStore::new());
        let donor_id = donor_with(&store, vec![batch("Bread", 10.0, EXPIRY)]).await.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.reconcile(donor_id, "Bread", EXPIRY, 3.0).await
            }));
        }
        let mut succeeded = 0;
        for h in handles {
            if h.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        let after = store.get_donor(donor_id).await.unwrap().unwrap();
        assert_eq!(after.current_donations, vec![batch("Bread", 1.0, EXPIRY)]);
    }

    #[tokio::test]
    async fn completion_can_be_claimed_once() {
        let store = MemoryStore::new();
        let pickup = store
            .insert_pickup(Pickup::pending(Vec::new(), Vec::new()))
            .await
            .unwrap();
        let at = OffsetDateTime::now_utc();

        let claimed = store.claim_completion(pickup.id, at).await.unwrap();
        assert_eq!(claimed.status, PickupStatus::Complete);
        assert_eq!(claimed.completed_at, Some(at));

        let again = store.claim_completion(pickup.id, at).await.unwrap_err();
        assert!(matches!(again, CoreError::AlreadyComplete(id) if id == pickup.id));

        let missing = store.claim_completion(Uuid::new_v4(), at).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { entity: "pickup", .. }));
    }
}
