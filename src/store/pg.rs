use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{Directory, PickupStore};
use crate::error::CoreError;
use crate::inventory::ledger::{
    batch_not_found, check_consumable, plan_consumption, Consumption, InventoryLedger,
};
use crate::models::{
    AvailableFood, Donor, FoodBatch, MatchResult, NewDonor, NewRecipient, Pickup, PickupStatus,
    PickupStop, ReconciliationFailure, Recipient,
};

/// Postgres-backed store. Reconciliation locks the donor row for the
/// duration of its transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DonorRow {
    id: Uuid,
    name: String,
    address: String,
    phone: String,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    donor_id: Uuid,
    name: String,
    quantity: f64,
    unit: String,
    expiry_date: OffsetDateTime,
}

impl From<BatchRow> for FoodBatch {
    fn from(r: BatchRow) -> Self {
        Self {
            name: r.name,
            quantity: r.quantity,
            unit: r.unit,
            expiry_date: r.expiry_date,
        }
    }
}

impl DonorRow {
    fn into_donor(self, current_donations: Vec<FoodBatch>) -> Donor {
        Donor {
            id: self.id,
            name: self.name,
            address: self.address,
            phone: self.phone,
            current_donations,
        }
    }
}

#[derive(Debug, FromRow)]
struct PickupRow {
    id: Uuid,
    created_at: OffsetDateTime,
    status: String,
    matches: Json<Vec<MatchResult>>,
    stops: Json<Vec<PickupStop>>,
    completed_at: Option<OffsetDateTime>,
    reconciliation_failures: Json<Vec<ReconciliationFailure>>,
}

impl TryFrom<PickupRow> for Pickup {
    type Error = CoreError;

    fn try_from(r: PickupRow) -> Result<Self, Self::Error> {
        let status = r
            .status
            .parse::<PickupStatus>()
            .map_err(|e: String| CoreError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Pickup {
            id: r.id,
            created_at: r.created_at,
            status,
            matches: r.matches.0,
            stops: r.stops.0,
            completed_at: r.completed_at,
            reconciliation_failures: r.reconciliation_failures.0,
        })
    }
}

fn insert_error(e: sqlx::Error, donor_id: Uuid, name: &str) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return CoreError::invalid(format!(
                "donor {donor_id} already holds a batch of {name:?} with this expiry"
            ));
        }
    }
    CoreError::Database(e)
}

async fn insert_batch(
    conn: &mut PgConnection,
    donor_id: Uuid,
    batch: &FoodBatch,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO food_batches (id, donor_id, name, quantity, unit, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(donor_id)
    .bind(&batch.name)
    .bind(batch.quantity)
    .bind(&batch.unit)
    .bind(batch.expiry_date)
    .execute(&mut *conn)
    .await
    .map_err(|e| insert_error(e, donor_id, &batch.name))?;
    Ok(())
}

async fn batches_of(db: &PgPool, donor_id: Uuid) -> Result<Vec<FoodBatch>, CoreError> {
    let rows = sqlx::query_as::<_, BatchRow>(
        r#"
        SELECT donor_id, name, quantity, unit, expiry_date
          FROM food_batches
         WHERE donor_id = $1
         ORDER BY seq
        "#,
    )
    .bind(donor_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(FoodBatch::from).collect())
}

#[async_trait]
impl Directory for PgStore {
    async fn create_donor(&self, new: NewDonor) -> Result<Donor, CoreError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DonorRow>(
            r#"
            INSERT INTO donors (id, name, address, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, address, phone
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.address)
        .bind(&new.phone)
        .fetch_one(&mut *tx)
        .await?;
        for batch in &new.current_donations {
            insert_batch(&mut tx, id, batch).await?;
        }
        tx.commit().await?;
        Ok(row.into_donor(new.current_donations))
    }

    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, CoreError> {
        let row = sqlx::query_as::<_, DonorRow>(
            r#"SELECT id, name, address, phone FROM donors WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let batches = batches_of(&self.pool, id).await?;
                Ok(Some(row.into_donor(batches)))
            }
            None => Ok(None),
        }
    }

    async fn list_donors(&self) -> Result<Vec<Donor>, CoreError> {
        let rows = sqlx::query_as::<_, DonorRow>(
            r#"SELECT id, name, address, phone FROM donors ORDER BY seq"#,
        )
        .fetch_all(&self.pool)
        .await?;
        let batches = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT donor_id, name, quantity, unit, expiry_date
              FROM food_batches
             ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_donor: HashMap<Uuid, Vec<FoodBatch>> = HashMap::new();
        for b in batches {
            by_donor.entry(b.donor_id).or_default().push(b.into());
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let batches = by_donor.remove(&row.id).unwrap_or_default();
                row.into_donor(batches)
            })
            .collect())
    }

    async fn create_recipient(&self, new: NewRecipient) -> Result<Recipient, CoreError> {
        let recipient = sqlx::query_as::<_, Recipient>(
            r#"
            INSERT INTO recipients (id, name, address, phone, daily_need)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, address, phone, daily_need
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.address)
        .bind(&new.phone)
        .bind(new.daily_need)
        .fetch_one(&self.pool)
        .await?;
        Ok(recipient)
    }

    async fn get_recipient(&self, id: Uuid) -> Result<Option<Recipient>, CoreError> {
        let recipient = sqlx::query_as::<_, Recipient>(
            r#"SELECT id, name, address, phone, daily_need FROM recipients WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(recipient)
    }

    async fn list_recipients(&self) -> Result<Vec<Recipient>, CoreError> {
        let rows = sqlx::query_as::<_, Recipient>(
            r#"SELECT id, name, address, phone, daily_need FROM recipients ORDER BY seq"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl InventoryLedger for PgStore {
    async fn add_batch(&self, donor_id: Uuid, batch: FoodBatch) -> Result<Donor, CoreError> {
        let mut tx = self.pool.begin().await?;
        let locked = sqlx::query_as::<_, DonorRow>(
            r#"SELECT id, name, address, phone FROM donors WHERE id = $1 FOR UPDATE"#,
        )
        .bind(donor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "donor",
            id: donor_id,
        })?;
        insert_batch(&mut tx, donor_id, &batch).await?;
        tx.commit().await?;

        let batches = batches_of(&self.pool, donor_id).await?;
        Ok(locked.into_donor(batches))
    }

    async fn available_food(&self) -> Result<Vec<AvailableFood>, CoreError> {
        let rows = sqlx::query_as::<_, AvailableFood>(
            r#"
            SELECT d.id AS donor_id, d.name AS donor_name,
                   b.name, b.quantity, b.unit, b.expiry_date
              FROM food_batches b
              JOIN donors d ON d.id = b.donor_id
             ORDER BY d.seq, b.seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn consume(
        &self,
        donor_id: Uuid,
        food_name: &str,
        expiry: OffsetDateTime,
        quantity: f64,
    ) -> Result<Consumption, CoreError> {
        check_consumable(quantity)?;
        let mut tx = self.pool.begin().await?;

        // Serializes every reconcile against this donor until commit.
        let locked: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT id FROM donors WHERE id = $1 FOR UPDATE"#)
                .bind(donor_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(batch_not_found(donor_id, food_name, expiry, quantity));
        }

        let candidates: Vec<(Uuid, f64)> = sqlx::query_as(
            r#"
            SELECT id, quantity
              FROM food_batches
             WHERE donor_id = $1 AND name = $2 AND expiry_date = $3
             ORDER BY seq
            "#,
        )
        .bind(donor_id)
        .bind(food_name)
        .bind(expiry)
        .fetch_all(&mut *tx)
        .await?;
        let quantities: Vec<f64> = candidates.iter().map(|(_, q)| *q).collect();

        let Some((pick, consumption)) = plan_consumption(&quantities, quantity) else {
            return Err(batch_not_found(donor_id, food_name, expiry, quantity));
        };
        let batch_id = candidates[pick].0;
        match consumption {
            Consumption::Exhausted => {
                sqlx::query(r#"DELETE FROM food_batches WHERE id = $1"#)
                    .bind(batch_id)
                    .execute(&mut *tx)
                    .await?;
            }
            Consumption::Partial { remaining } => {
                sqlx::query(r#"UPDATE food_batches SET quantity = $2 WHERE id = $1"#)
                    .bind(batch_id)
                    .bind(remaining)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        debug!(%donor_id, food_name, quantity, ?consumption, "batch consumed");
        Ok(consumption)
    }
}

#[async_trait]
impl PickupStore for PgStore {
    async fn insert_pickup(&self, pickup: Pickup) -> Result<Pickup, CoreError> {
        sqlx::query(
            r#"
            INSERT INTO pickups (id, created_at, status, matches, stops, completed_at, reconciliation_failures)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pickup.id)
        .bind(pickup.created_at)
        .bind(pickup.status.as_str())
        .bind(Json(&pickup.matches))
        .bind(Json(&pickup.stops))
        .bind(pickup.completed_at)
        .bind(Json(&pickup.reconciliation_failures))
        .execute(&self.pool)
        .await?;
        Ok(pickup)
    }

    async fn get_pickup(&self, id: Uuid) -> Result<Option<Pickup>, CoreError> {
        let row = sqlx::query_as::<_, PickupRow>(
            r#"
            SELECT id, created_at, status, matches, stops, completed_at, reconciliation_failures
              FROM pickups
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Pickup::try_from).transpose()
    }

    async fn list_pickups(&self) -> Result<Vec<Pickup>, CoreError> {
        let rows = sqlx::query_as::<_, PickupRow>(
            r#"
            SELECT id, created_at, status, matches, stops, completed_at, reconciliation_failures
              FROM pickups
             ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Pickup::try_from).collect()
    }

    async fn claim_completion(&self, id: Uuid, at: OffsetDateTime) -> Result<Pickup, CoreError> {
        // Concurrent claims queue on the row lock; the loser re-checks the
        // status predicate and updates nothing.
        let row = sqlx::query_as::<_, PickupRow>(
            r#"
            UPDATE pickups
               SET status = 'complete', completed_at = $2
             WHERE id = $1 AND status <> 'complete'
            RETURNING id, created_at, status, matches, stops, completed_at, reconciliation_failures
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return Pickup::try_from(row);
        }

        let exists: bool = sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM pickups WHERE id = $1)"#)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Err(CoreError::AlreadyComplete(id))
        } else {
            Err(CoreError::NotFound {
                entity: "pickup",
                id,
            })
        }
    }

    async fn record_failures(
        &self,
        id: Uuid,
        failures: &[ReconciliationFailure],
    ) -> Result<Pickup, CoreError> {
        let row = sqlx::query_as::<_, PickupRow>(
            r#"
            UPDATE pickups
               SET reconciliation_failures = $2
             WHERE id = $1
            RETURNING id, created_at, status, matches, stops, completed_at, reconciliation_failures
            "#,
        )
        .bind(id)
        .bind(Json(failures))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "pickup",
            id,
        })?;
        Pickup::try_from(row)
    }
}

// These run against a real database and skip when DATABASE_URL is unset.
#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use time::macros::datetime;

    const EXPIRY: OffsetDateTime = datetime!(2026-10-25 0:00 UTC);

    async fn test_store() -> anyhow::Result<Option<PgStore>> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(v) => v,
            Err(_) => {
                eprintln!("SKIP: DATABASE_URL not set");
                return Ok(None);
            }
        };
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await?;
        crate::db::migrate(&pool).await?;
        Ok(Some(PgStore::new(pool)))
    }

    fn bread(quantity: f64) -> FoodBatch {
        FoodBatch {
            name: "Bread".into(),
            quantity,
            unit: "kg".into(),
            expiry_date: EXPIRY,
        }
    }

    async fn bakery(store: &PgStore, batches: Vec<FoodBatch>) -> anyhow::Result<Donor> {
        Ok(store
            .create_donor(NewDonor {
                name: "Corner Bakery".into(),
                address: "12 Baker St".into(),
                phone: "555-0100".into(),
                current_donations: batches,
            })
            .await?)
    }

    #[tokio::test]
    async fn consume_decrements_then_removes() -> anyhow::Result<()> {
        let Some(store) = test_store().await? else {
            return Ok(());
        };
        let donor = bakery(&store, vec![bread(5.0)]).await?;

        let c = store.consume(donor.id, "Bread", EXPIRY, 3.0).await?;
        assert_eq!(c, Consumption::Partial { remaining: 2.0 });
        let err = store.consume(donor.id, "Bread", EXPIRY, 2.5).await.unwrap_err();
        assert!(matches!(err, CoreError::BatchNotFound { .. }));
        let c = store.consume(donor.id, "Bread", EXPIRY, 2.0).await?;
        assert_eq!(c, Consumption::Exhausted);

        let after = store.get_donor(donor.id).await?.unwrap();
        assert!(after.current_donations.is_empty());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_serialize_on_the_donor_row() -> anyhow::Result<()> {
        let Some(store) = test_store().await? else {
            return Ok(());
        };
        let donor_id = bakery(&store, vec![bread(10.0)]).await?.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reconcile(donor_id, "Bread", EXPIRY, 3.0).await
            }));
        }
        let mut succeeded = 0;
        for h in handles {
            if h.await? {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 3);
        let after = store.get_donor(donor_id).await?.unwrap();
        assert_eq!(after.current_donations[0].quantity, 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_batch_identity_is_invalid_input() -> anyhow::Result<()> {
        let Some(store) = test_store().await? else {
            return Ok(());
        };
        let donor = bakery(&store, vec![bread(5.0)]).await?;

        let err = store.add_batch(donor.id, bread(1.0)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        let err = bakery(&store, vec![bread(1.0), bread(2.0)]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::InvalidInput(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn completion_is_claimed_once_and_failures_persist() -> anyhow::Result<()> {
        let Some(store) = test_store().await? else {
            return Ok(());
        };
        let donor = bakery(&store, vec![bread(5.0)]).await?;
        let item = MatchResult {
            recipient_id: Uuid::new_v4(),
            recipient_name: "Night Shelter".into(),
            donor_id: donor.id,
            donor_name: donor.name.clone(),
            food_name: "Bread".into(),
            quantity_matched: 9.0,
            unit: "kg".into(),
            expiry_date: EXPIRY,
        };
        let pickup = store
            .insert_pickup(Pickup::pending(vec![item.clone()], Vec::new()))
            .await?;

        let claimed = store.claim_completion(pickup.id, EXPIRY).await?;
        assert_eq!(claimed.status, PickupStatus::Complete);
        assert_eq!(claimed.completed_at, Some(EXPIRY));
        let again = store.claim_completion(pickup.id, EXPIRY).await.unwrap_err();
        assert!(matches!(again, CoreError::AlreadyComplete(_)));
        let missing = store.claim_completion(Uuid::new_v4(), EXPIRY).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { entity: "pickup", .. }));

        let failure = ReconciliationFailure {
            item,
            reason: "not enough bread".into(),
        };
        store.record_failures(pickup.id, &[failure.clone()]).await?;
        let stored = store.get_pickup(pickup.id).await?.unwrap();
        assert_eq!(stored.reconciliation_failures, vec![failure]);
        assert_eq!(stored.matches, claimed.matches);
        Ok(())
    }
}
