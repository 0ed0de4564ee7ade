//! Sale use-case service.
//!
//! # Responsibility
//! - Record sales with their line items and stock consumption.
//! - Expose line items, optionally joined to their live product rows.
//! - Edit sale headers and delete sales on admin request.
//!
//! # Invariants
//! - Line items never load their product implicitly;
//!   `line_items_with_products` is the only join and it is explicit.
//! - Deleting a sale returns its consumed stock in the same transaction.

use super::{map_repo_error, require_admin, ServiceResult};
use crate::error::EntityError;
use crate::model::location::LocationId;
use crate::model::now;
use crate::model::product::Product;
use crate::model::sale::{NewSale, NewSaleLine, PaymentMethod, Sale, SaleId, SaleLineItem};
use crate::model::user::Principal;
use crate::repo::product_repo::ProductRepository;
use crate::repo::query::{ListQuery, Page};
use crate::repo::sale_repo::{SaleField, SaleRepository};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "Sale";

/// Caller input for recording a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub location_id: LocationId,
    /// Defaults to the recording time.
    pub sale_date: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,
    pub discount_percentage: Decimal,
    pub lines: Vec<NewSaleLine>,
}

/// Editable header fields of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleHeaderUpdate {
    pub location_id: LocationId,
    pub payment_method: PaymentMethod,
    pub sale_date: DateTime<Utc>,
}

/// A sale together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetails {
    pub sale: Sale,
    pub lines: Vec<SaleLineItem>,
}

/// A line item joined to the current product row it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemWithProduct {
    pub line: SaleLineItem,
    pub product: Product,
}

pub struct SaleService<S: SaleRepository, P: ProductRepository> {
    sales: S,
    products: P,
}

impl<S: SaleRepository, P: ProductRepository> SaleService<S, P> {
    pub fn new(sales: S, products: P) -> Self {
        Self { sales, products }
    }

    /// Records a sale, snapshots product data into its lines and consumes
    /// stock, all or nothing.
    pub fn record_sale(
        &self,
        principal: &Principal,
        request: &SaleRequest,
    ) -> ServiceResult<SaleDetails> {
        let draft = NewSale {
            location_id: request.location_id,
            sale_date: request.sale_date.unwrap_or_else(now),
            payment_method: request.payment_method,
            discount_percentage: request.discount_percentage,
            lines: request.lines.clone(),
            created_by: principal.username.clone(),
        };
        draft
            .validate()
            .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;

        let sale = match self.sales.create(&draft) {
            Ok(sale) => sale,
            Err(err) => {
                warn!(
                    "event=sale_record module=sale status=error location_id={} lines={} error={err}",
                    draft.location_id,
                    draft.lines.len()
                );
                return Err(map_repo_error(PREFIX, err));
            }
        };
        let lines = self.line_items(sale.id)?;
        info!(
            "event=sale_record module=sale status=ok sale_id={} lines={} final_total={} actor={}",
            sale.id,
            lines.len(),
            sale.final_total,
            principal.username
        );
        Ok(SaleDetails { sale, lines })
    }

    pub fn get_sale(&self, id: SaleId) -> ServiceResult<Sale> {
        self.sales
            .get_required(id)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    pub fn get_sale_details(&self, id: SaleId) -> ServiceResult<SaleDetails> {
        let sale = self.get_sale(id)?;
        let lines = self.line_items(id)?;
        Ok(SaleDetails { sale, lines })
    }

    pub fn list_sales(&self, query: &ListQuery<SaleField>) -> ServiceResult<Page<Sale>> {
        self.sales
            .list(query)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Line items of an existing sale.
    pub fn line_items(&self, sale_id: SaleId) -> ServiceResult<Vec<SaleLineItem>> {
        self.get_sale(sale_id)?;
        self.sales
            .line_items(sale_id)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Line items paired with the product rows they reference, fetched by
    /// id. Soft-deleted products are still returned.
    pub fn line_items_with_products(
        &self,
        sale_id: SaleId,
    ) -> ServiceResult<Vec<LineItemWithProduct>> {
        self.line_items(sale_id)?
            .into_iter()
            .map(|line| {
                let product = self
                    .products
                    .get_required(line.product_id)
                    .map_err(|err| map_repo_error(PREFIX, err))?;
                Ok(LineItemWithProduct { line, product })
            })
            .collect()
    }

    /// Changes location, payment method and sale date. Totals and lines
    /// are left as recorded.
    pub fn update_sale(
        &self,
        principal: &Principal,
        id: SaleId,
        update: &SaleHeaderUpdate,
    ) -> ServiceResult<Sale> {
        let mut sale = self.get_sale(id)?;
        sale.location_id = update.location_id;
        sale.payment_method = update.payment_method;
        sale.sale_date = update.sale_date;

        let sale = self
            .sales
            .update(&sale)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=sale_update module=sale status=ok sale_id={id} actor={}",
            principal.username
        );
        Ok(sale)
    }

    /// Deletes a sale and its lines and returns consumed stock. Admin only.
    pub fn delete_sale(&self, principal: &Principal, id: SaleId) -> ServiceResult<()> {
        require_admin(principal, PREFIX, "delete sale")?;
        self.sales
            .delete_by(id, &principal.username)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=sale_delete module=sale status=ok sale_id={id} actor={}",
            principal.username
        );
        Ok(())
    }
}
