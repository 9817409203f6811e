//! Greedy neediest-first allocation of available food to recipients.
//!
//! Pure: works on a snapshot, never mutates its inputs and never touches
//! persistence. Two runs over the same batches may propose overlapping
//! matches; the ledger settles that at reconciliation time.

use std::cmp::Ordering;

use crate::error::CoreError;
use crate::inventory::ledger::QUANTITY_EPSILON;
use crate::models::{AvailableFood, MatchResult, Recipient};

/// Proposes donor to recipient allocations.
///
/// Recipients are served by descending `daily_need`, ties in input order.
/// Each recipient walks the batches in input order, taking whole batches until
/// one batch can cover the rest of its need. Batches drained by a needier
/// recipient are unavailable to later ones. Units are not converted.
pub fn allocate(
    recipients: &[Recipient],
    food: &[AvailableFood],
) -> Result<Vec<MatchResult>, CoreError> {
    validate(recipients, food)?;

    let mut order: Vec<&Recipient> = recipients.iter().collect();
    // sort_by is stable, so equal needs keep input order.
    order.sort_by(|a, b| {
        b.daily_need
            .partial_cmp(&a.daily_need)
            .unwrap_or(Ordering::Equal)
    });

    let mut remaining: Vec<f64> = food.iter().map(|f| f.quantity).collect();
    let mut matches = Vec::new();

    for recipient in order {
        let mut need = recipient.daily_need;
        for (batch, left) in food.iter().zip(remaining.iter_mut()) {
            if need <= QUANTITY_EPSILON {
                break;
            }
            // Residue below epsilon is what the ledger treats as an exhausted batch.
            if *left <= QUANTITY_EPSILON {
                continue;
            }
            if *left >= need {
                matches.push(proposal(recipient, batch, need));
                *left -= need;
                if *left <= QUANTITY_EPSILON {
                    *left = 0.0;
                }
                break;
            }
            matches.push(proposal(recipient, batch, *left));
            need -= *left;
            *left = 0.0;
        }
    }

    Ok(matches)
}

fn proposal(recipient: &Recipient, batch: &AvailableFood, quantity: f64) -> MatchResult {
    MatchResult {
        recipient_id: recipient.id,
        recipient_name: recipient.name.clone(),
        donor_id: batch.donor_id,
        donor_name: batch.donor_name.clone(),
        food_name: batch.name.clone(),
        quantity_matched: quantity,
        unit: batch.unit.clone(),
        expiry_date: batch.expiry_date,
    }
}

fn validate(recipients: &[Recipient], food: &[AvailableFood]) -> Result<(), CoreError> {
    if let Some(r) = recipients
        .iter()
        .find(|r| !r.daily_need.is_finite() || r.daily_need < 0.0)
    {
        return Err(CoreError::invalid(format!(
            "recipient {} has invalid daily_need {}",
            r.id, r.daily_need
        )));
    }
    if let Some(f) = food
        .iter()
        .find(|f| !f.quantity.is_finite() || f.quantity < 0.0)
    {
        return Err(CoreError::invalid(format!(
            "batch {:?} of donor {} has invalid quantity {}",
            f.name, f.donor_id, f.quantity
        )));
    }
    Ok(())
}
