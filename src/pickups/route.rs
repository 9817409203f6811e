use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{MatchResult, PickupStop, StopType};
use crate::store::Directory;

/// Name and street address of a donor or recipient, as the directory holds them.
#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub name: String,
    pub address: String,
}

impl Party {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Resolves donor and recipient ids to their directory records.
pub trait AddressLookup {
    fn donor(&self, donor_id: Uuid) -> Option<&Party>;
    fn recipient(&self, recipient_id: Uuid) -> Option<&Party>;
}

/// Parties referenced by one set of matches.
#[derive(Debug, Default, Clone)]
pub struct AddressBook {
    donors: HashMap<Uuid, Party>,
    recipients: HashMap<Uuid, Party>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_donor(mut self, id: Uuid, party: Party) -> Self {
        self.donors.insert(id, party);
        self
    }

    pub fn with_recipient(mut self, id: Uuid, party: Party) -> Self {
        self.recipients.insert(id, party);
        self
    }

    /// Loads every donor and recipient named in `matches`.
    /// An id the directory does not know is rejected.
    pub async fn load(directory: &dyn Directory, matches: &[MatchResult]) -> Result<Self, CoreError> {
        let mut book = Self::new();
        for m in matches {
            if !book.donors.contains_key(&m.donor_id) {
                let donor = directory
                    .get_donor(m.donor_id)
                    .await?
                    .ok_or_else(|| CoreError::invalid(format!("unknown donor {}", m.donor_id)))?;
                book.donors.insert(donor.id, Party::new(donor.name, donor.address));
            }
            if !book.recipients.contains_key(&m.recipient_id) {
                let recipient = directory.get_recipient(m.recipient_id).await?.ok_or_else(|| {
                    CoreError::invalid(format!("unknown recipient {}", m.recipient_id))
                })?;
                book.recipients
                    .insert(recipient.id, Party::new(recipient.name, recipient.address));
            }
        }
        Ok(book)
    }
}

impl AddressLookup for AddressBook {
    fn donor(&self, donor_id: Uuid) -> Option<&Party> {
        self.donors.get(&donor_id)
    }

    fn recipient(&self, recipient_id: Uuid) -> Option<&Party> {
        self.recipients.get(&recipient_id)
    }
}

/// Turns matches into an ordered list of stops.
///
/// For each match in order: a pickup at the donor, then a dropoff at the
/// recipient, each skipped when its address was already visited on this
/// route. Addresses compare as plain strings, so two parties sharing an
/// address share a stop. Stop names come from the lookup, not from the match.
/// No distance optimisation is attempted.
pub fn build_stops(
    matches: &[MatchResult],
    lookup: &impl AddressLookup,
) -> Result<Vec<PickupStop>, CoreError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stops = Vec::new();

    for m in matches {
        let donor = lookup
            .donor(m.donor_id)
            .ok_or_else(|| CoreError::invalid(format!("no address for donor {}", m.donor_id)))?;
        if seen.insert(donor.address.as_str()) {
            stops.push(PickupStop {
                stop_type: StopType::Pickup,
                name: donor.name.clone(),
                address: donor.address.clone(),
            });
        }

        let recipient = lookup.recipient(m.recipient_id).ok_or_else(|| {
            CoreError::invalid(format!("no address for recipient {}", m.recipient_id))
        })?;
        if seen.insert(recipient.address.as_str()) {
            stops.push(PickupStop {
                stop_type: StopType::Dropoff,
                name: recipient.name.clone(),
                address: recipient.address.clone(),
            });
        }
    }

    Ok(stops)
}
