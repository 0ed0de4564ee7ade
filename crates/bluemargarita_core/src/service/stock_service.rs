//! Stock mutation use-case service.
//!
//! # Responsibility
//! - Apply ADD/REMOVE/SET operations to a product's stock level.
//! - Return a `StockUpdateResult` describing exactly what changed.
//!
//! # Invariants
//! - Read, rule check and write of one update share one transaction.
//! - Failed updates leave stock untouched and log a `status=error` line.

use super::{map_repo_error, ServiceResult};
use crate::error::EntityError;
use crate::model::product::ProductId;
use crate::model::stock::{
    StockOperation, StockPolicy, StockRuleError, StockUpdateRequest, StockUpdateResult,
};
use crate::model::user::Principal;
use crate::repo::product_repo::ProductRepository;
use log::{info, warn};

const PREFIX: &str = "Stock";

pub struct StockService<R: ProductRepository> {
    repo: R,
    policy: StockPolicy,
}

impl<R: ProductRepository> StockService<R> {
    pub fn new(repo: R, policy: StockPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> StockPolicy {
        self.policy
    }

    pub fn update_stock(
        &self,
        principal: &Principal,
        request: &StockUpdateRequest,
    ) -> ServiceResult<StockUpdateResult> {
        match self
            .repo
            .apply_stock_update(request, self.policy, &principal.username)
        {
            Ok(result) => {
                info!(
                    "event=stock_update module=stock status=ok product_id={} operation={} previous={} new={} change={} actor={}",
                    result.product_id,
                    result.operation_type,
                    result.previous_stock,
                    result.new_stock,
                    result.change_amount,
                    principal.username
                );
                Ok(result)
            }
            Err(err) => {
                warn!(
                    "event=stock_update module=stock status=error product_id={} operation={} amount={} error={err}",
                    request.product_id, request.operation, request.amount
                );
                Err(map_repo_error(PREFIX, err))
            }
        }
    }

    /// Like `update_stock`, with the operation given as text
    /// (`ADD`, `REMOVE` or `SET`, any case).
    pub fn update_stock_by_name(
        &self,
        principal: &Principal,
        product_id: ProductId,
        operation: &str,
        amount: i64,
    ) -> ServiceResult<StockUpdateResult> {
        let operation: StockOperation = operation
            .parse()
            .map_err(|err: StockRuleError| EntityError::invalid_argument(PREFIX, err.to_string()))?;
        self.update_stock(
            principal,
            &StockUpdateRequest {
                product_id,
                operation,
                amount,
            },
        )
    }
}
