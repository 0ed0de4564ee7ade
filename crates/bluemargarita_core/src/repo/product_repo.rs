//! Product repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over the `products` catalogue.
//! - Apply stock mutations as one serialized read-modify-write.
//!
//! # Invariants
//! - Codes are unique case-insensitively, including soft-deleted rows.
//! - `delete` is a soft delete so sale line items never dangle.
//! - Stock reads and writes of one mutation share one immediate transaction.

use super::query::{fetch_page, FilterField, ListQuery, Page};
use super::{
    begin_immediate, bool_to_int, ensure_connection_ready, map_unique_violation, millis,
    read_bool, read_decimal, read_optional_timestamp, read_timestamp, RepoError, RepoResult,
    Repository, TableSpec,
};
use crate::model::now;
use crate::model::product::{NewProduct, Product, ProductId};
use crate::model::stock::{StockPolicy, StockUpdateRequest, StockUpdateResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PRODUCT_SELECT_SQL: &str = "SELECT
    id,
    code,
    description,
    wholesale_price,
    suggested_price,
    stock,
    low_stock_alert,
    created_at,
    updated_at,
    created_by,
    last_updated_by,
    is_active,
    deleted_at
FROM products";

const PRODUCT_TABLE: TableSpec = TableSpec {
    name: "products",
    columns: &[
        "id",
        "code",
        "description",
        "wholesale_price",
        "suggested_price",
        "stock",
        "low_stock_alert",
        "created_at",
        "updated_at",
        "created_by",
        "last_updated_by",
        "is_active",
        "deleted_at",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Id,
    Code,
    Description,
    Stock,
    LowStockAlert,
    /// Compared numerically; prices are stored as decimal text.
    WholesalePrice,
    SuggestedPrice,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

impl FilterField for ProductField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Code => "code",
            Self::Description => "description",
            Self::Stock => "stock",
            Self::LowStockAlert => "low_stock_alert",
            Self::WholesalePrice => "CAST(wholesale_price AS REAL)",
            Self::SuggestedPrice => "CAST(suggested_price AS REAL)",
            Self::IsActive => "is_active",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

pub trait ProductRepository:
    Repository<Product, ProductId, Draft = NewProduct, Field = ProductField>
{
    fn find_by_code(&self, code: &str) -> RepoResult<Option<Product>>;
    fn exists_by_code(&self, code: &str) -> RepoResult<bool>;
    /// Applies one stock mutation atomically and reports before/after.
    fn apply_stock_update(
        &self,
        request: &StockUpdateRequest,
        policy: StockPolicy,
        actor: &str,
    ) -> RepoResult<StockUpdateResult>;
}

pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[PRODUCT_TABLE])?;
        Ok(Self { conn })
    }
}

impl Repository<Product, ProductId> for SqliteProductRepository<'_> {
    type Draft = NewProduct;
    type Field = ProductField;

    const ENTITY: &'static str = "product";

    fn create(&self, draft: &NewProduct) -> RepoResult<Product> {
        let draft = draft.clone().normalized()?;
        let at = now();
        let product = Product {
            id: 0,
            code: draft.code,
            description: draft.description,
            wholesale_price: draft.wholesale_price,
            suggested_price: draft.suggested_price,
            stock: draft.stock,
            low_stock_alert: draft.low_stock_alert,
            created_at: at,
            updated_at: at,
            created_by: draft.created_by.clone(),
            last_updated_by: draft.created_by,
            is_active: true,
            deleted_at: None,
        };

        self.conn
            .execute(
                "INSERT INTO products (
                    code,
                    description,
                    wholesale_price,
                    suggested_price,
                    stock,
                    low_stock_alert,
                    created_at,
                    updated_at,
                    created_by,
                    last_updated_by,
                    is_active,
                    deleted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL);",
                params![
                    product.code.as_str(),
                    product.description.as_str(),
                    product.wholesale_price.to_string(),
                    product.suggested_price.to_string(),
                    product.stock,
                    product.low_stock_alert,
                    millis(product.created_at),
                    millis(product.updated_at),
                    product.created_by.as_str(),
                    product.last_updated_by.as_str(),
                    bool_to_int(product.is_active),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || format!("code `{}`", product.code))
            })?;

        Ok(Product {
            id: self.conn.last_insert_rowid(),
            ..product
        })
    }

    fn get_by_id(&self, id: ProductId) -> RepoResult<Option<Product>> {
        load_product(self.conn, id)
    }

    /// Updates catalogue fields. The stock column is left untouched; stock
    /// only changes through `apply_stock_update` and sale recording.
    fn update(&self, entity: &Product) -> RepoResult<Product> {
        entity.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE products
                 SET
                    code = ?1,
                    description = ?2,
                    wholesale_price = ?3,
                    suggested_price = ?4,
                    low_stock_alert = ?5,
                    updated_at = ?6,
                    last_updated_by = ?7,
                    is_active = ?8,
                    deleted_at = ?9
                 WHERE id = ?10;",
                params![
                    entity.code.as_str(),
                    entity.description.as_str(),
                    entity.wholesale_price.to_string(),
                    entity.suggested_price.to_string(),
                    entity.low_stock_alert,
                    millis(entity.updated_at),
                    entity.last_updated_by.as_str(),
                    bool_to_int(entity.is_active),
                    entity.deleted_at.map(millis),
                    entity.id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || format!("code `{}`", entity.code))
            })?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id: entity.id,
            });
        }

        self.get_required(entity.id)
    }

    fn delete(&self, id: ProductId) -> RepoResult<()> {
        let at = millis(now());
        let changed = self.conn.execute(
            "UPDATE products
             SET
                is_active = 0,
                deleted_at = COALESCE(deleted_at, ?1),
                updated_at = ?1
             WHERE id = ?2;",
            params![at, id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id,
            });
        }
        Ok(())
    }

    fn list(&self, query: &ListQuery<ProductField>) -> RepoResult<Page<Product>> {
        fetch_page(
            self.conn,
            "products",
            PRODUCT_SELECT_SQL,
            query,
            "id ASC",
            parse_product_row,
        )
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn find_by_code(&self, code: &str) -> RepoResult<Option<Product>> {
        self.conn
            .query_row(
                &format!("{PRODUCT_SELECT_SQL} WHERE code = ?1;"),
                [code],
                |row| Ok(parse_product_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn exists_by_code(&self, code: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products WHERE code = ?1);",
            [code],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn apply_stock_update(
        &self,
        request: &StockUpdateRequest,
        policy: StockPolicy,
        actor: &str,
    ) -> RepoResult<StockUpdateResult> {
        let tx = begin_immediate(self.conn)?;

        let product = load_product(&tx, request.product_id)?.ok_or(RepoError::NotFound {
            entity: Self::ENTITY,
            id: request.product_id,
        })?;
        if !product.is_active {
            return Err(RepoError::InactiveReference {
                entity: Self::ENTITY,
                id: product.id,
            });
        }

        let at = now();
        let result = request
            .operation
            .resolve(product.stock, request.amount, policy)
            .and_then(|new_stock| {
                StockUpdateResult::applied(
                    &product,
                    request.operation,
                    product.stock,
                    new_stock,
                    at,
                )
            })
            .map_err(|source| RepoError::StockRule {
                product_id: product.id,
                source,
            })?;

        write_stock(&tx, product.id, result.new_stock, actor, at)?;
        tx.commit()?;

        Ok(result)
    }
}

/// Loads one product on any connection or open transaction.
pub(crate) fn load_product(conn: &Connection, id: ProductId) -> RepoResult<Option<Product>> {
    conn.query_row(
        &format!("{PRODUCT_SELECT_SQL} WHERE id = ?1;"),
        [id],
        |row| Ok(parse_product_row(row)),
    )
    .optional()?
    .transpose()
}

/// Writes a new stock level and audit fields for one product.
pub(crate) fn write_stock(
    conn: &Connection,
    id: ProductId,
    stock: i64,
    actor: &str,
    at: DateTime<Utc>,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE products
         SET
            stock = ?1,
            updated_at = ?2,
            last_updated_by = ?3
         WHERE id = ?4;",
        params![stock, millis(at), actor, id],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "product",
            id,
        });
    }
    Ok(())
}

fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let product = Product {
        id: row.get("id")?,
        code: row.get("code")?,
        description: row.get("description")?,
        wholesale_price: read_decimal(row, "wholesale_price")?,
        suggested_price: read_decimal(row, "suggested_price")?,
        stock: row.get("stock")?,
        low_stock_alert: row.get("low_stock_alert")?,
        created_at: read_timestamp(row, "created_at")?,
        updated_at: read_timestamp(row, "updated_at")?,
        created_by: row.get("created_by")?,
        last_updated_by: row.get("last_updated_by")?,
        is_active: read_bool(row, "is_active")?,
        deleted_at: read_optional_timestamp(row, "deleted_at")?,
    };
    product.validate()?;
    Ok(product)
}
