use tracing::instrument;

use super::summary::{summarize, Summary};
use crate::error::CoreError;
use crate::matching::allocate;
use crate::models::AvailableFood;
use crate::state::AppState;

/// Builds the summary from one read of donors and recipients. The matching
/// run uses the batches of those same donor records.
#[instrument(skip(st))]
pub async fn current_summary(st: &AppState) -> Result<Summary, CoreError> {
    let donors = st.directory.list_donors().await?;
    let recipients = st.directory.list_recipients().await?;
    let food: Vec<AvailableFood> = donors
        .iter()
        .flat_map(|d| {
            d.current_donations
                .iter()
                .map(move |b| AvailableFood::from_batch(d, b))
        })
        .collect();
    let matches = allocate(&recipients, &food)?;
    Ok(summarize(&donors, &recipients, &matches))
}
