use serde::Serialize;
use uuid::Uuid;

use crate::models::{Donor, MatchResult, Recipient};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorParticipation {
    pub donor_id: Uuid,
    pub name: String,
    pub active_donations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeedShare {
    pub recipient_id: Uuid,
    pub name: String,
    pub daily_need: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedTotal {
    pub recipient_id: Uuid,
    pub name: String,
    pub quantity_matched: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub donor_participation: Vec<DonorParticipation>,
    pub recipient_needs: Vec<NeedShare>,
    pub matched_by_recipient: Vec<MatchedTotal>,
}

pub fn summarize(donors: &[Donor], recipients: &[Recipient], matches: &[MatchResult]) -> Summary {
    let donor_participation = donors
        .iter()
        .map(|d| DonorParticipation {
            donor_id: d.id,
            name: d.name.clone(),
            active_donations: d.current_donations.len(),
        })
        .collect();

    let total_need: f64 = recipients.iter().map(|r| r.daily_need).sum();
    let recipient_needs = recipients
        .iter()
        .map(|r| NeedShare {
            recipient_id: r.id,
            name: r.name.clone(),
            daily_need: r.daily_need,
            percent: if total_need > 0.0 {
                r.daily_need / total_need * 100.0
            } else {
                0.0
            },
        })
        .collect();

    // First-seen order, which is the neediest-first order of the matches.
    let mut matched_by_recipient: Vec<MatchedTotal> = Vec::new();
    for m in matches {
        match matched_by_recipient
            .iter_mut()
            .find(|t| t.recipient_id == m.recipient_id)
        {
            Some(total) => total.quantity_matched += m.quantity_matched,
            None => matched_by_recipient.push(MatchedTotal {
                recipient_id: m.recipient_id,
                name: m.recipient_name.clone(),
                quantity_matched: m.quantity_matched,
            }),
        }
    }

    Summary {
        donor_participation,
        recipient_needs,
        matched_by_recipient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FoodBatch;
    use time::macros::datetime;

    fn recipient(name: &str, need: f64) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: name.into(),
            address: "1 Main St".into(),
            phone: "555-0123".into(),
            daily_need: need,
        }
    }

    fn matched(r: &Recipient, qty: f64) -> MatchResult {
        MatchResult {
            recipient_id: r.id,
            recipient_name: r.name.clone(),
            donor_id: Uuid::nil(),
            donor_name: "Bakery".into(),
            food_name: "Bread".into(),
            quantity_matched: qty,
            unit: "kg".into(),
            expiry_date: datetime!(2026-10-25 0:00 UTC),
        }
    }

    #[test]
    fn aggregates_dashboard_figures() {
        let donor = Donor {
            id: Uuid::new_v4(),
            name: "Bakery".into(),
            address: "12 Baker St".into(),
            phone: "555-0100".into(),
            current_donations: vec![FoodBatch {
                name: "Bread".into(),
                quantity: 3.0,
                unit: "kg".into(),
                expiry_date: datetime!(2026-10-25 0:00 UTC),
            }],
        };
        let big = recipient("Big", 30.0);
        let small = recipient("Small", 10.0);
        let matches = vec![matched(&big, 8.0), matched(&big, 2.0), matched(&small, 5.0)];

        let s = summarize(&[donor], &[big.clone(), small.clone()], &matches);

        assert_eq!(s.donor_participation[0].active_donations, 1);
        assert_eq!(s.recipient_needs[0].percent, 75.0);
        assert_eq!(s.recipient_needs[1].percent, 25.0);
        assert_eq!(s.matched_by_recipient.len(), 2);
        assert_eq!(s.matched_by_recipient[0].quantity_matched, 10.0);
        assert_eq!(s.matched_by_recipient[1].name, "Small");
    }

    #[test]
    fn zero_total_need_gives_zero_percent() {
        let s = summarize(&[], &[recipient("Idle", 0.0)], &[]);
        assert_eq!(s.recipient_needs[0].percent, 0.0);
        assert!(s.matched_by_recipient.is_empty());
    }
}
