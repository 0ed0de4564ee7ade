//! Product catalogue record with live stock level.
//!
//! # Invariants
//! - `code` is unique case-insensitively in storage.
//! - Prices are non-negative with at most two fractional digits and never
//!   exceed `PRICE_MAX`.
//! - `deleted_at` is set iff `is_active == false`.

use super::{
    normalize_required_text, validate_decimal, validate_soft_delete_state, ValidationError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ProductId = i64;

pub const PRODUCT_CODE_MAX_CHARS: usize = 50;
pub const PRODUCT_DESCRIPTION_MAX_CHARS: usize = 255;
pub const PRICE_SCALE: u32 = 2;
/// Largest price representable with precision 10, scale 2 (99999999.99).
pub const PRICE_MAX: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "productId")]
    pub id: ProductId,
    pub code: String,
    pub description: String,
    pub wholesale_price: Decimal,
    /// Retail price before any sale discount.
    pub suggested_price: Decimal,
    pub stock: i64,
    /// Stock at or below this level is reported as low.
    pub low_stock_alert: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_updated_by: String,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Insert shape for a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub code: String,
    pub description: String,
    pub wholesale_price: Decimal,
    pub suggested_price: Decimal,
    pub stock: i64,
    pub low_stock_alert: i64,
    pub created_by: String,
}

impl Product {
    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_product_code(&self.code)?;
        normalize_product_description(&self.description)?;
        validate_price("wholesale_price", self.wholesale_price)?;
        validate_price("suggested_price", self.suggested_price)?;
        if self.low_stock_alert < 0 {
            return Err(ValidationError::new("low_stock_alert", "cannot be negative"));
        }
        validate_soft_delete_state(self.is_active, self.deleted_at)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.low_stock_alert
    }

    pub fn soft_delete(&mut self, at: DateTime<Utc>, actor: &str) {
        if self.is_active {
            self.is_active = false;
            self.deleted_at = Some(at);
        }
        self.updated_at = at;
        self.last_updated_by = actor.to_string();
    }
}

impl NewProduct {
    /// Normalizes text fields and checks every field rule.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.code = normalize_product_code(&self.code)?;
        self.description = normalize_product_description(&self.description)?;
        validate_price("wholesale_price", self.wholesale_price)?;
        validate_price("suggested_price", self.suggested_price)?;
        if self.stock < 0 {
            return Err(ValidationError::new("stock", "initial stock cannot be negative"));
        }
        if self.low_stock_alert < 0 {
            return Err(ValidationError::new("low_stock_alert", "cannot be negative"));
        }
        Ok(self)
    }
}

pub fn normalize_product_code(code: &str) -> Result<String, ValidationError> {
    let code = normalize_required_text("code", code, PRODUCT_CODE_MAX_CHARS)?;
    if code.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("code", "cannot contain whitespace"));
    }
    Ok(code)
}

pub fn normalize_product_description(description: &str) -> Result<String, ValidationError> {
    normalize_required_text("description", description, PRODUCT_DESCRIPTION_MAX_CHARS)
}

pub fn validate_price(field: &'static str, price: Decimal) -> Result<(), ValidationError> {
    validate_decimal(field, price, PRICE_SCALE)?;
    if price > PRICE_MAX {
        return Err(ValidationError::new(
            field,
            format!("cannot exceed {PRICE_MAX}"),
        ));
    }
    Ok(())
}
