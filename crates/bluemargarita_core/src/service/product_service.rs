//! Product catalogue use-case service.
//!
//! # Responsibility
//! - Create, edit, list and soft-delete products.
//! - Report active products whose stock reached their alert threshold.
//! - Report active products priced at or below their wholesale cost.
//!
//! # Invariants
//! - Product codes stay unique case-insensitively, deleted rows included.
//! - Catalogue edits never change stock; see `StockService`.

use super::{map_repo_error, require_admin, ServiceResult};
use crate::error::EntityError;
use crate::model::now;
use crate::model::product::{NewProduct, Product, ProductId};
use crate::model::user::Principal;
use crate::repo::product_repo::{ProductField, ProductRepository};
use crate::repo::query::{Comparison, ListQuery, Page, Predicate, SortDirection};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "Product";

/// Editable catalogue fields of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub code: String,
    pub description: String,
    pub wholesale_price: Decimal,
    pub suggested_price: Decimal,
    pub low_stock_alert: i64,
}

/// Optional narrowing of the low-stock report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockFilter {
    /// Substring matched against description or code.
    pub name_or_code: Option<String>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
}

impl LowStockFilter {
    fn predicate(&self) -> Predicate<ProductField> {
        let mut predicate = Predicate::eq(ProductField::IsActive, true).and(Predicate::fields(
            ProductField::Stock,
            Comparison::Lte,
            ProductField::LowStockAlert,
        ));

        if let Some(text) = name_or_code(self.name_or_code.as_deref()) {
            predicate = predicate.and(text);
        }
        if let Some(min) = self.min_stock {
            predicate = predicate.and(Predicate::gte(ProductField::Stock, min));
        }
        if let Some(max) = self.max_stock {
            predicate = predicate.and(Predicate::lte(ProductField::Stock, max));
        }
        predicate
    }
}

/// Optional narrowing of the mispriced-products report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MispricedFilter {
    pub name_or_code: Option<String>,
}

impl MispricedFilter {
    fn predicate(&self) -> Predicate<ProductField> {
        let mut predicate = Predicate::eq(ProductField::IsActive, true).and(Predicate::fields(
            ProductField::SuggestedPrice,
            Comparison::Lte,
            ProductField::WholesalePrice,
        ));
        if let Some(text) = name_or_code(self.name_or_code.as_deref()) {
            predicate = predicate.and(text);
        }
        predicate
    }
}

/// Description-or-code substring match; blank text matches everything.
fn name_or_code(needle: Option<&str>) -> Option<Predicate<ProductField>> {
    let needle = needle.map(str::trim).filter(|value| !value.is_empty())?;
    Some(Predicate::any([
        Predicate::contains(ProductField::Description, needle),
        Predicate::contains(ProductField::Code, needle),
    ]))
}

pub struct ProductService<R: ProductRepository> {
    repo: R,
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_product(
        &self,
        principal: &Principal,
        details: &ProductDetails,
        initial_stock: i64,
    ) -> ServiceResult<Product> {
        let draft = NewProduct {
            code: details.code.clone(),
            description: details.description.clone(),
            wholesale_price: details.wholesale_price,
            suggested_price: details.suggested_price,
            stock: initial_stock,
            low_stock_alert: details.low_stock_alert,
            created_by: principal.username.clone(),
        }
        .normalized()
        .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;
        self.ensure_code_free(&draft.code, None)?;

        let product = self
            .repo
            .create(&draft)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=product_create module=product status=ok product_id={} code={} actor={}",
            product.id, product.code, principal.username
        );
        Ok(product)
    }

    /// Replaces the catalogue fields of an active product.
    pub fn update_product(
        &self,
        principal: &Principal,
        id: ProductId,
        details: &ProductDetails,
    ) -> ServiceResult<Product> {
        let mut product = self.get_product(id)?;
        if !product.is_active {
            return Err(EntityError::invalid_argument(
                PREFIX,
                format!("product {id} is deleted and cannot be edited"),
            )
            .into());
        }

        let validated = NewProduct {
            code: details.code.clone(),
            description: details.description.clone(),
            wholesale_price: details.wholesale_price,
            suggested_price: details.suggested_price,
            stock: product.stock.max(0),
            low_stock_alert: details.low_stock_alert,
            created_by: product.created_by.clone(),
        }
        .normalized()
        .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;
        self.ensure_code_free(&validated.code, Some(id))?;

        product.code = validated.code;
        product.description = validated.description;
        product.wholesale_price = validated.wholesale_price;
        product.suggested_price = validated.suggested_price;
        product.low_stock_alert = validated.low_stock_alert;
        product.updated_at = now();
        product.last_updated_by = principal.username.clone();

        let product = self
            .repo
            .update(&product)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=product_update module=product status=ok product_id={id} actor={}",
            principal.username
        );
        Ok(product)
    }

    pub fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.repo
            .get_required(id)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    pub fn list_products(&self, query: &ListQuery<ProductField>) -> ServiceResult<Page<Product>> {
        self.repo
            .list(query)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Active products with `stock <= low_stock_alert`, lowest stock first.
    pub fn list_low_stock_products(
        &self,
        filter: &LowStockFilter,
        page: u32,
        page_size: u32,
    ) -> ServiceResult<Page<Product>> {
        if let (Some(min), Some(max)) = (filter.min_stock, filter.max_stock) {
            if min > max {
                return Err(EntityError::invalid_argument(
                    PREFIX,
                    format!("min stock {min} is greater than max stock {max}"),
                )
                .into());
            }
        }

        let query = ListQuery::new()
            .filter(filter.predicate())
            .sort(ProductField::Stock, SortDirection::Asc)
            .page(page, page_size);
        self.list_products(&query)
    }

    /// Active products whose suggested price does not exceed the wholesale
    /// price, cheapest first.
    pub fn list_mispriced_products(
        &self,
        filter: &MispricedFilter,
        page: u32,
        page_size: u32,
    ) -> ServiceResult<Page<Product>> {
        let query = ListQuery::new()
            .filter(filter.predicate())
            .sort(ProductField::SuggestedPrice, SortDirection::Asc)
            .page(page, page_size);
        self.list_products(&query)
    }

    /// Soft-deletes a product. Admin only. Past sale lines keep their
    /// snapshots.
    pub fn delete_product(&self, principal: &Principal, id: ProductId) -> ServiceResult<Product> {
        require_admin(principal, PREFIX, "delete product")?;
        let mut product = self.get_product(id)?;
        product.soft_delete(now(), &principal.username);
        let product = self
            .repo
            .update(&product)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=product_delete module=product status=ok product_id={id} actor={}",
            principal.username
        );
        Ok(product)
    }

    fn ensure_code_free(&self, code: &str, owner: Option<ProductId>) -> ServiceResult<()> {
        let existing = self
            .repo
            .find_by_code(code)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        match existing {
            Some(product) if Some(product.id) != owner => Err(EntityError::already_exists(
                PREFIX,
                format!("product code `{code}` is already in use"),
            )
            .into()),
            _ => Ok(()),
        }
    }
}
