use tracing::{info, instrument};

use super::engine::allocate;
use crate::{error::CoreError, models::MatchResult, state::AppState};

/// Runs the allocator over a fresh snapshot of recipients and available food.
#[instrument(skip(st))]
pub async fn run_matching(st: &AppState) -> Result<Vec<MatchResult>, CoreError> {
    let recipients = st.directory.list_recipients().await?;
    let food = st.ledger.available_food().await?;
    let matches = allocate(&recipients, &food)?;
    info!(
        recipients = recipients.len(),
        batches = food.len(),
        matches = matches.len(),
        "matching run finished"
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodBatch, NewDonor, NewRecipient};
    use time::macros::datetime;

    #[tokio::test]
    async fn matches_against_the_current_snapshot() {
        let st = AppState::in_memory();
        let expiry = datetime!(2026-10-23 0:00 UTC);
        st.directory
            .create_donor(NewDonor {
                name: "Green Grocer".into(),
                address: "4 Market Sq".into(),
                phone: "555-0101".into(),
                current_donations: vec![FoodBatch {
                    name: "Carrots".into(),
                    quantity: 6.0,
                    unit: "kg".into(),
                    expiry_date: expiry,
                }],
            })
            .await
            .unwrap();
        let shelter = st
            .directory
            .create_recipient(NewRecipient {
                name: "Night Shelter".into(),
                address: "9 Hill Rd".into(),
                phone: "555-0199".into(),
                daily_need: 4.0,
            })
            .await
            .unwrap();

        let matches = run_matching(&st).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].recipient_id, shelter.id);
        assert_eq!(matches[0].quantity_matched, 4.0);
        assert_eq!(matches[0].expiry_date, expiry);

        // Proposals are not reservations.
        let food = st.ledger.available_food().await.unwrap();
        assert_eq!(food[0].quantity, 6.0);
    }
}
