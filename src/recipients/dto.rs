use serde::Deserialize;

use crate::error::CoreError;
use crate::models::NewRecipient;
use crate::validate;

/// Request body for recipient registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRecipientRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub daily_need: f64,
}

impl RegisterRecipientRequest {
    pub fn validate(self) -> Result<NewRecipient, CoreError> {
        Ok(NewRecipient {
            name: validate::required("name", self.name)?,
            address: validate::required("address", self.address)?,
            phone: validate::phone(self.phone)?,
            daily_need: validate::non_negative_quantity("daily_need", self.daily_need)?,
        })
    }
}
