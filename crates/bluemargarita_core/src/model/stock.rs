//! Stock mutation rules and the per-call update report.
//!
//! # Invariants
//! - `StockUpdateResult::change_amount == new_stock - previous_stock`.
//! - ADD/REMOVE take a positive delta; SET takes the target level.
//! - Unless `StockPolicy::allow_negative`, no operation yields negative stock.

use super::product::{Product, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockOperation {
    Add,
    Remove,
    Set,
}

impl StockOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Set => "SET",
        }
    }

    /// Computes the new stock level from `previous` and the request amount.
    pub fn resolve(
        self,
        previous: i64,
        amount: i64,
        policy: StockPolicy,
    ) -> Result<i64, StockRuleError> {
        match self {
            Self::Add | Self::Remove if amount <= 0 => Err(StockRuleError::NonPositiveAmount {
                operation: self,
                amount,
            }),
            Self::Add => previous
                .checked_add(amount)
                .ok_or(StockRuleError::Overflow),
            Self::Remove => {
                let next = previous
                    .checked_sub(amount)
                    .ok_or(StockRuleError::Overflow)?;
                if next < 0 && !policy.allow_negative {
                    return Err(StockRuleError::InsufficientStock {
                        available: previous,
                        requested: amount,
                    });
                }
                Ok(next)
            }
            Self::Set => {
                if amount < 0 && !policy.allow_negative {
                    return Err(StockRuleError::NegativeTarget { target: amount });
                }
                amount
                    .checked_sub(previous)
                    .ok_or(StockRuleError::Overflow)?;
                Ok(amount)
            }
        }
    }
}

impl Display for StockOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockOperation {
    type Err = StockRuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(Self::Add),
            "REMOVE" => Ok(Self::Remove),
            "SET" => Ok(Self::Set),
            _ => Err(StockRuleError::UnknownOperation(value.to_string())),
        }
    }
}

/// Whether stock may go below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockPolicy {
    pub allow_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockRuleError {
    NonPositiveAmount {
        operation: StockOperation,
        amount: i64,
    },
    InsufficientStock {
        available: i64,
        requested: i64,
    },
    NegativeTarget {
        target: i64,
    },
    Overflow,
    UnknownOperation(String),
}

impl Display for StockRuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveAmount { operation, amount } => {
                write!(f, "{operation} amount must be positive, got {amount}")
            }
            Self::InsufficientStock {
                available,
                requested,
            } => write!(
                f,
                "insufficient stock: requested {requested}, available {available}"
            ),
            Self::NegativeTarget { target } => {
                write!(f, "stock cannot be set to negative value {target}")
            }
            Self::Overflow => write!(f, "stock level out of range"),
            Self::UnknownOperation(value) => {
                write!(f, "unknown stock operation `{value}`; expected ADD|REMOVE|SET")
            }
        }
    }
}

impl Error for StockRuleError {}

/// One stock mutation as requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateRequest {
    pub product_id: ProductId,
    pub operation: StockOperation,
    /// Delta for ADD/REMOVE, target level for SET.
    pub amount: i64,
}

/// Immutable before/after report of one stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateResult {
    pub product_id: ProductId,
    pub product_code: String,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub change_amount: i64,
    pub success: bool,
    pub operation_type: StockOperation,
    pub updated_at: DateTime<Utc>,
}

impl StockUpdateResult {
    /// Reports a completed change of `product` from `previous` to `new_stock`.
    ///
    /// Fails with [`StockRuleError::Overflow`] when the delta does not fit in `i64`.
    pub fn applied(
        product: &Product,
        operation: StockOperation,
        previous: i64,
        new_stock: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, StockRuleError> {
        let change_amount = new_stock
            .checked_sub(previous)
            .ok_or(StockRuleError::Overflow)?;
        Ok(Self {
            product_id: product.id,
            product_code: product.code.clone(),
            previous_stock: previous,
            new_stock,
            change_amount,
            success: true,
            operation_type: operation,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT: StockPolicy = StockPolicy {
        allow_negative: false,
    };
    const LENIENT: StockPolicy = StockPolicy {
        allow_negative: true,
    };

    #[test]
    fn add_and_remove_move_by_delta() {
        assert_eq!(StockOperation::Add.resolve(4, 6, STRICT).unwrap(), 10);
        assert_eq!(StockOperation::Remove.resolve(10, 4, STRICT).unwrap(), 6);
        assert_eq!(StockOperation::Remove.resolve(4, 4, STRICT).unwrap(), 0);
    }

    #[test]
    fn remove_below_zero_is_rejected_unless_allowed() {
        assert_eq!(
            StockOperation::Remove.resolve(4, 10, STRICT).unwrap_err(),
            StockRuleError::InsufficientStock {
                available: 4,
                requested: 10
            }
        );
        assert_eq!(StockOperation::Remove.resolve(4, 10, LENIENT).unwrap(), -6);
    }

    #[test]
    fn set_uses_target_directly() {
        assert_eq!(StockOperation::Set.resolve(4, 25, STRICT).unwrap(), 25);
        assert_eq!(StockOperation::Set.resolve(4, 0, STRICT).unwrap(), 0);
        assert!(matches!(
            StockOperation::Set.resolve(4, -1, STRICT),
            Err(StockRuleError::NegativeTarget { target: -1 })
        ));
    }

    #[test]
    fn zero_or_negative_delta_is_rejected() {
        for operation in [StockOperation::Add, StockOperation::Remove] {
            for amount in [0, -3] {
                assert!(matches!(
                    operation.resolve(5, amount, LENIENT),
                    Err(StockRuleError::NonPositiveAmount { .. })
                ));
            }
        }
    }

    #[test]
    fn add_overflow_is_reported() {
        assert_eq!(
            StockOperation::Add.resolve(i64::MAX, 1, STRICT).unwrap_err(),
            StockRuleError::Overflow
        );
    }

    #[test]
    fn set_delta_overflow_is_reported() {
        assert_eq!(
            StockOperation::Set.resolve(5, i64::MIN, LENIENT).unwrap_err(),
            StockRuleError::Overflow
        );
        assert_eq!(StockOperation::Set.resolve(5, -7, LENIENT).unwrap(), -7);
    }

    #[test]
    fn operation_parses_case_insensitively_and_serializes_upper() {
        assert_eq!("remove".parse::<StockOperation>().unwrap(), StockOperation::Remove);
        assert!("MOVE".parse::<StockOperation>().is_err());
        assert_eq!(
            serde_json::to_string(&StockOperation::Set).unwrap(),
            "\"SET\""
        );
    }
}
