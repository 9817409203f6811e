use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;

use crate::error::CoreError;

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ().\-]{2,24}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

/// Trims `value` and rejects it when empty.
pub(crate) fn required(field: &str, value: String) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn phone(value: String) -> Result<String, CoreError> {
    let value = required("phone", value)?;
    if !is_valid_phone(&value) {
        return Err(CoreError::invalid(format!("invalid phone number {value:?}")));
    }
    Ok(value)
}

pub(crate) fn positive_quantity(field: &str, value: f64) -> Result<f64, CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::invalid(format!("{field} must be positive, got {value}")));
    }
    Ok(value)
}

pub(crate) fn non_negative_quantity(field: &str, value: f64) -> Result<f64, CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::invalid(format!("{field} must not be negative, got {value}")));
    }
    Ok(value)
}

/// Drops sub-microsecond precision so an expiry compares equal after a
/// round trip through Postgres `TIMESTAMPTZ`.
pub(crate) fn expiry(value: OffsetDateTime) -> Result<OffsetDateTime, CoreError> {
    value
        .replace_nanosecond(value.nanosecond() / 1_000 * 1_000)
        .map_err(|e| CoreError::invalid(format!("invalid expiry_date: {e}")))
}
