use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A quantity of one food item with one expiry, owned by one donor.
///
/// Identity for reconciliation is `(donor id, name, expiry_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodBatch {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub current_donations: Vec<FoodBatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub daily_need: f64,
}

/// Validated input for a new donor.
#[derive(Debug, Clone)]
pub struct NewDonor {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub current_donations: Vec<FoodBatch>,
}

/// Validated input for a new recipient.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub daily_need: f64,
}

/// Read-only projection of a batch together with its owning donor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AvailableFood {
    pub donor_id: Uuid,
    pub donor_name: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
}

impl AvailableFood {
    pub fn from_batch(donor: &Donor, batch: &FoodBatch) -> Self {
        Self {
            donor_id: donor.id,
            donor_name: donor.name.clone(),
            name: batch.name.clone(),
            quantity: batch.quantity,
            unit: batch.unit.clone(),
            expiry_date: batch.expiry_date,
        }
    }
}

/// A proposed allocation of part of one batch to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub recipient_id: Uuid,
    pub recipient_name: String,
    pub donor_id: Uuid,
    pub donor_name: String,
    pub food_name: String,
    pub quantity_matched: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupStop {
    pub stop_type: StopType,
    pub name: String,
    pub address: String,
}

/// `InProgress` is reserved; no operation moves a pickup into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Pending,
    InProgress,
    Complete,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Pending => "pending",
            PickupStatus::InProgress => "in_progress",
            PickupStatus::Complete => "complete",
        }
    }
}

impl std::str::FromStr for PickupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PickupStatus::Pending),
            "in_progress" => Ok(PickupStatus::InProgress),
            "complete" => Ok(PickupStatus::Complete),
            other => Err(format!("unknown pickup status {other:?}")),
        }
    }
}

/// A match whose quantity could not be deducted when its pickup completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationFailure {
    #[serde(rename = "match")]
    pub item: MatchResult,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: PickupStatus,
    pub matches: Vec<MatchResult>,
    pub stops: Vec<PickupStop>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub reconciliation_failures: Vec<ReconciliationFailure>,
}

impl Pickup {
    pub fn pending(matches: Vec<MatchResult>, stops: Vec<PickupStop>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            status: PickupStatus::Pending,
            matches,
            stops,
            completed_at: None,
            reconciliation_failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PickupStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn pickup_serializes_with_lowercase_enums() {
        let pickup = Pickup::pending(
            Vec::new(),
            vec![PickupStop {
                stop_type: StopType::Dropoff,
                name: "Downtown Shelter".into(),
                address: "1 Main St".into(),
            }],
        );
        let json = serde_json::to_string(&pickup).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"stop_type\":\"dropoff\""));
        assert!(json.contains("\"completed_at\":null"));
    }

    #[test]
    fn failure_nests_match_under_match_key() {
        let failure = ReconciliationFailure {
            item: MatchResult {
                recipient_id: Uuid::nil(),
                recipient_name: "Shelter".into(),
                donor_id: Uuid::nil(),
                donor_name: "Bakery".into(),
                food_name: "Bread".into(),
                quantity_matched: 2.0,
                unit: "kg".into(),
                expiry_date: datetime!(2026-10-25 0:00 UTC),
            },
            reason: "batch not found".into(),
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["match"]["food_name"], "Bread");
        assert_eq!(value["match"]["expiry_date"], "2026-10-25T00:00:00Z");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            PickupStatus::Pending,
            PickupStatus::InProgress,
            PickupStatus::Complete,
        ] {
            assert_eq!(status.as_str().parse::<PickupStatus>().unwrap(), status);
        }
        assert!("done".parse::<PickupStatus>().is_err());
    }
}
