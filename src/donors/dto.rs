use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::CoreError;
use crate::models::{FoodBatch, NewDonor};
use crate::validate;

/// Request body for adding a food batch to a donor.
#[derive(Debug, Deserialize)]
pub struct AddFoodRequest {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
}

impl AddFoodRequest {
    pub fn validate(self) -> Result<FoodBatch, CoreError> {
        Ok(FoodBatch {
            name: validate::required("name", self.name)?,
            quantity: validate::positive_quantity("quantity", self.quantity)?,
            unit: validate::required("unit", self.unit)?,
            expiry_date: validate::expiry(self.expiry_date)?,
        })
    }
}

/// Request body for donor registration.
#[derive(Debug, Deserialize)]
pub struct RegisterDonorRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub current_donations: Vec<AddFoodRequest>,
}

impl RegisterDonorRequest {
    pub fn validate(self) -> Result<NewDonor, CoreError> {
        Ok(NewDonor {
            name: validate::required("name", self.name)?,
            address: validate::required("address", self.address)?,
            phone: validate::phone(self.phone)?,
            current_donations: self
                .current_donations
                .into_iter()
                .map(AddFoodRequest::validate)
                .collect::<Result<_, _>>()?,
        })
    }
}
