//! Sales and their line items.
//!
//! # Responsibility
//! - Define the sale aggregate and its `sale_product` line rows.
//! - Capture product description and prices at sale time.
//!
//! # Invariants
//! - Line items reference their sale and product by id only; related rows
//!   are fetched explicitly by callers.
//! - Snapshot fields never change after the line is recorded, whatever
//!   happens to the live product afterwards.
//! - Quantities are positive with at most three fractional digits.

use super::location::LocationId;
use super::product::{Product, ProductId, PRICE_SCALE};
use super::{validate_decimal, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type SaleId = i64;
pub type SaleLineItemId = i64;

pub const QUANTITY_SCALE: u32 = 3;
/// Largest quantity representable with precision 8, scale 3.
pub const QUANTITY_MAX: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Card => "CARD",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CASH" => Ok(Self::Cash),
            "CARD" => Ok(Self::Card),
            other => Err(ValidationError::new(
                "payment_method",
                format!("unknown payment method `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    #[serde(rename = "saleId")]
    pub id: SaleId,
    pub location_id: LocationId,
    pub sale_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    /// Percentage in `0..=100` applied to every suggested line price.
    pub discount_percentage: Decimal,
    pub suggested_total: Decimal,
    pub final_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// One product line of a recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineItem {
    pub id: SaleLineItemId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub product_description_snapshot: String,
    /// Price actually charged per unit, after discount.
    pub price_at_the_time: Decimal,
    pub wholesale_price_at_the_time: Decimal,
    /// Per-unit price before discount.
    pub suggested_price_at_the_time: Decimal,
}

/// Requested line of a sale about to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSaleLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// Insert shape for a sale with all its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub location_id: LocationId,
    pub sale_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub discount_percentage: Decimal,
    pub lines: Vec<NewSaleLine>,
    pub created_by: String,
}

impl NewSale {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lines.is_empty() {
            return Err(ValidationError::new("lines", "a sale needs at least one product"));
        }
        validate_discount(self.discount_percentage)?;
        for line in &self.lines {
            validate_quantity(line.quantity)?;
        }
        Ok(())
    }
}

/// Values copied from a product at the moment it is sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSnapshot {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub description: String,
    pub price: Decimal,
    pub wholesale_price: Decimal,
    pub suggested_price: Decimal,
}

impl LineSnapshot {
    pub fn capture(
        product: &Product,
        quantity: Decimal,
        discount_percentage: Decimal,
    ) -> Result<Self, ValidationError> {
        let price = discounted_price(product.suggested_price, discount_percentage)
            .ok_or_else(amount_out_of_range)?;
        Ok(Self {
            product_id: product.id,
            quantity,
            description: product.description.clone(),
            price,
            wholesale_price: product.wholesale_price,
            suggested_price: product.suggested_price,
        })
    }

    /// `None` when the line amount does not fit in a `Decimal`.
    pub fn final_amount(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity).map(round_money)
    }

    pub fn suggested_amount(&self) -> Option<Decimal> {
        self.suggested_price.checked_mul(self.quantity).map(round_money)
    }
}

/// Sale totals as `(suggested_total, final_total)`.
pub fn sale_totals(lines: &[LineSnapshot]) -> Result<(Decimal, Decimal), ValidationError> {
    lines.iter().try_fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(suggested, actual), line| {
            let suggested = line
                .suggested_amount()
                .and_then(|amount| suggested.checked_add(amount));
            let actual = line
                .final_amount()
                .and_then(|amount| actual.checked_add(amount));
            suggested.zip(actual).ok_or_else(amount_out_of_range)
        },
    )
}

/// Unit price after applying `discount_percentage` to `suggested`.
pub fn discounted_price(suggested: Decimal, discount_percentage: Decimal) -> Option<Decimal> {
    let hundred = Decimal::ONE_HUNDRED;
    suggested
        .checked_mul(hundred.checked_sub(discount_percentage)?)?
        .checked_div(hundred)
        .map(round_money)
}

fn amount_out_of_range() -> ValidationError {
    ValidationError::new("amount", "sale amount out of range")
}

/// Whole stock units consumed by selling `quantity` (fractions round up).
pub fn stock_units(quantity: Decimal) -> Option<i64> {
    quantity.ceil().to_i64()
}

pub fn validate_quantity(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::new("quantity", "must be greater than zero"));
    }
    if quantity > QUANTITY_MAX {
        return Err(ValidationError::new(
            "quantity",
            format!("cannot exceed {QUANTITY_MAX}"),
        ));
    }
    validate_decimal("quantity", quantity, QUANTITY_SCALE)
}

pub fn validate_discount(discount_percentage: Decimal) -> Result<(), ValidationError> {
    validate_decimal("discount_percentage", discount_percentage, PRICE_SCALE)?;
    if discount_percentage > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new(
            "discount_percentage",
            "cannot exceed 100",
        ));
    }
    Ok(())
}

/// Rounds half away from zero and pads to exactly two fractional digits.
fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_SCALE);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now;
    use crate::model::product::PRICE_MAX;

    fn product() -> Product {
        let at = now();
        Product {
            id: 3,
            code: "NK-9".to_string(),
            description: "Pearl necklace".to_string(),
            wholesale_price: Decimal::new(1000, 2),
            suggested_price: Decimal::new(2500, 2),
            stock: 10,
            low_stock_alert: 1,
            created_at: at,
            updated_at: at,
            created_by: "admin".to_string(),
            last_updated_by: "admin".to_string(),
            is_active: true,
            deleted_at: None,
        }
    }

    #[test]
    fn snapshot_applies_discount_and_copies_prices() {
        let snapshot =
            LineSnapshot::capture(&product(), Decimal::new(2, 0), Decimal::new(10, 0)).unwrap();
        assert_eq!(snapshot.description, "Pearl necklace");
        assert_eq!(snapshot.price, Decimal::new(2250, 2));
        assert_eq!(snapshot.suggested_price, Decimal::new(2500, 2));
        assert_eq!(snapshot.wholesale_price, Decimal::new(1000, 2));

        let (suggested, actual) = sale_totals(&[snapshot]).unwrap();
        assert_eq!(suggested, Decimal::new(5000, 2));
        assert_eq!(actual, Decimal::new(4500, 2));
    }

    #[test]
    fn discounted_price_rounds_half_away_from_zero() {
        // 0.05 * 0.5 = 0.025 -> 0.03
        assert_eq!(
            discounted_price(Decimal::new(5, 2), Decimal::new(50, 0)),
            Some(Decimal::new(3, 2))
        );
    }

    #[test]
    fn oversized_amounts_are_reported_instead_of_overflowing() {
        let mut huge = product();
        huge.suggested_price = Decimal::MAX;
        assert!(discounted_price(Decimal::MAX, Decimal::new(10, 0)).is_none());
        assert_eq!(
            LineSnapshot::capture(&huge, Decimal::new(2, 0), Decimal::ZERO)
                .unwrap_err()
                .field,
            "amount"
        );

        let mut snapshot =
            LineSnapshot::capture(&product(), Decimal::new(2, 0), Decimal::ZERO).unwrap();
        snapshot.suggested_price = Decimal::MAX;
        assert!(snapshot.suggested_amount().is_none());
        assert_eq!(sale_totals(&[snapshot]).unwrap_err().field, "amount");
    }

    #[test]
    fn largest_price_times_largest_quantity_fits() {
        let mut priciest = product();
        priciest.suggested_price = PRICE_MAX;
        priciest.wholesale_price = PRICE_MAX;
        let snapshot = LineSnapshot::capture(&priciest, QUANTITY_MAX, Decimal::ZERO).unwrap();
        let (suggested, actual) = sale_totals(&[snapshot.clone(), snapshot]).unwrap();
        assert_eq!(suggested, actual);
        assert_eq!(suggested.to_string(), "19999999798000.00");
    }

    #[test]
    fn fractional_quantities_consume_whole_units() {
        assert_eq!(stock_units(Decimal::new(1250, 3)), Some(2));
        assert_eq!(stock_units(Decimal::new(3, 0)), Some(3));
    }

    #[test]
    fn quantity_and_discount_bounds() {
        assert!(validate_quantity(Decimal::new(1, 3)).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(Decimal::new(1, 4)).is_err());
        assert!(validate_quantity(Decimal::new(100_000, 0)).is_err());
        assert!(validate_discount(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_discount(Decimal::new(10001, 2)).is_err());
    }

    #[test]
    fn new_sale_requires_lines() {
        let sale = NewSale {
            location_id: 1,
            sale_date: now(),
            payment_method: PaymentMethod::Cash,
            discount_percentage: Decimal::ZERO,
            lines: Vec::new(),
            created_by: "maria".to_string(),
        };
        assert_eq!(sale.validate().unwrap_err().field, "lines");
    }
}
