//! Domain records for the inventory and sales core.
//!
//! # Responsibility
//! - Define the canonical data shapes shared by repositories and services.
//! - Keep field validation next to the data it guards.
//!
//! # Invariants
//! - Soft-deletable records keep `deleted_at.is_some() == !is_active`.
//! - Timestamps carry millisecond precision, matching storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod location;
pub mod product;
pub mod sale;
pub mod stock;
pub mod user;

/// Field-level validation failure raised before any persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Current UTC time truncated to whole milliseconds.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Checks the soft-delete pairing of `is_active` and `deleted_at`.
pub(crate) fn validate_soft_delete_state(
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    if is_active == deleted_at.is_none() {
        Ok(())
    } else {
        Err(ValidationError::new(
            "deleted_at",
            "must be set exactly when the record is inactive",
        ))
    }
}

/// Trims `value` and enforces a 1..=`max_chars` length.
pub(crate) fn normalize_required_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "cannot be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("cannot exceed {max_chars} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Non-negative decimal with at most `max_scale` fractional digits.
pub(crate) fn validate_decimal(
    field: &'static str,
    value: Decimal,
    max_scale: u32,
) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new(field, "cannot be negative"));
    }
    if value.normalize().scale() > max_scale {
        return Err(ValidationError::new(
            field,
            format!("cannot have more than {max_scale} fractional digits"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_truncated_to_milliseconds() {
        let value = now();
        assert_eq!(value.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn soft_delete_state_requires_pairing() {
        assert!(validate_soft_delete_state(true, None).is_ok());
        assert!(validate_soft_delete_state(false, Some(now())).is_ok());
        assert!(validate_soft_delete_state(true, Some(now())).is_err());
        assert!(validate_soft_delete_state(false, None).is_err());
    }

    #[test]
    fn decimal_validation_checks_sign_and_scale() {
        assert!(validate_decimal("price", Decimal::new(1250, 2), 2).is_ok());
        assert!(validate_decimal("price", Decimal::new(12500, 3), 2).is_ok());
        assert!(validate_decimal("price", Decimal::new(12505, 3), 2).is_err());
        assert!(validate_decimal("price", Decimal::new(-1, 0), 2).is_err());
    }

    #[test]
    fn required_text_is_trimmed_and_bounded() {
        assert_eq!(normalize_required_text("name", "  Shop ", 10).unwrap(), "Shop");
        assert!(normalize_required_text("name", "   ", 10).is_err());
        assert!(normalize_required_text("name", "abcdefghijk", 10).is_err());
    }
}
