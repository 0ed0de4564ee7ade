//! Sale repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Record a sale, its `sale_product` lines and the stock they consume
//!   in one transaction.
//! - Expose line items by explicit lookup only.
//!
//! # Invariants
//! - Line snapshots are copied from the product row read inside the
//!   recording transaction.
//! - Deleting a sale returns consumed stock and removes its lines.

use super::location_repo::load_location;
use super::product_repo::{load_product, write_stock};
use super::query::{fetch_page, FilterField, ListQuery, Page};
use super::{
    begin_immediate, ensure_connection_ready, millis, read_decimal, read_enum, read_timestamp,
    RepoError, RepoResult, Repository, TableSpec,
};
use crate::model::now;
use crate::model::sale::{
    sale_totals, stock_units, LineSnapshot, NewSale, Sale, SaleId, SaleLineItem, SaleLineItemId,
};
use crate::model::stock::{StockOperation, StockPolicy, StockRuleError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

const SYSTEM_ACTOR: &str = "system";

const SALE_SELECT_SQL: &str = "SELECT
    id,
    location_id,
    sale_date,
    payment_method,
    discount_percentage,
    suggested_total,
    final_total,
    created_at,
    created_by
FROM sales";

const LINE_ITEM_SELECT_SQL: &str = "SELECT
    id,
    sale_id,
    product_id,
    quantity,
    product_description_snapshot,
    price_at_the_time,
    wholesale_price_at_the_time,
    suggested_price_at_the_time
FROM sale_product";

const SALE_TABLES: &[TableSpec] = &[
    TableSpec {
        name: "sales",
        columns: &[
            "id",
            "location_id",
            "sale_date",
            "payment_method",
            "discount_percentage",
            "suggested_total",
            "final_total",
            "created_at",
            "created_by",
        ],
    },
    TableSpec {
        name: "sale_product",
        columns: &[
            "id",
            "sale_id",
            "product_id",
            "quantity",
            "product_description_snapshot",
            "price_at_the_time",
            "wholesale_price_at_the_time",
            "suggested_price_at_the_time",
        ],
    },
    TableSpec {
        name: "products",
        columns: &["id", "stock"],
    },
    TableSpec {
        name: "locations",
        columns: &["id", "is_active"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleField {
    Id,
    LocationId,
    SaleDate,
    PaymentMethod,
    CreatedBy,
    CreatedAt,
}

impl FilterField for SaleField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::LocationId => "location_id",
            Self::SaleDate => "sale_date",
            Self::PaymentMethod => "payment_method",
            Self::CreatedBy => "created_by",
            Self::CreatedAt => "created_at",
        }
    }
}

pub trait SaleRepository: Repository<Sale, SaleId, Draft = NewSale, Field = SaleField> {
    /// Lines of one sale in insertion order.
    fn line_items(&self, sale_id: SaleId) -> RepoResult<Vec<SaleLineItem>>;
    fn get_line_item(&self, id: SaleLineItemId) -> RepoResult<Option<SaleLineItem>>;
    /// Deletes a sale with its lines and returns the consumed stock,
    /// recording `actor` as the products' last updater.
    fn delete_by(&self, id: SaleId, actor: &str) -> RepoResult<()>;
}

pub struct SqliteSaleRepository<'conn> {
    conn: &'conn Connection,
    policy: StockPolicy,
}

impl<'conn> SqliteSaleRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, SALE_TABLES)?;
        Ok(Self {
            conn,
            policy: StockPolicy::default(),
        })
    }

    /// Stock policy applied when sales consume stock.
    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Repository<Sale, SaleId> for SqliteSaleRepository<'_> {
    type Draft = NewSale;
    type Field = SaleField;

    const ENTITY: &'static str = "sale";

    fn create(&self, draft: &NewSale) -> RepoResult<Sale> {
        draft.validate()?;
        let tx = begin_immediate(self.conn)?;
        let at = now();

        let location = load_location(&tx, draft.location_id)?.ok_or(RepoError::NotFound {
            entity: "location",
            id: draft.location_id,
        })?;
        if !location.is_active {
            return Err(RepoError::InactiveReference {
                entity: "location",
                id: location.id,
            });
        }

        let mut snapshots = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product = load_product(&tx, line.product_id)?.ok_or(RepoError::NotFound {
                entity: "product",
                id: line.product_id,
            })?;
            if !product.is_active {
                return Err(RepoError::InactiveReference {
                    entity: "product",
                    id: product.id,
                });
            }

            let units = units_or_overflow(product.id, line.quantity)?;
            let new_stock = StockOperation::Remove
                .resolve(product.stock, units, self.policy)
                .map_err(|source| RepoError::StockRule {
                    product_id: product.id,
                    source,
                })?;
            write_stock(&tx, product.id, new_stock, &draft.created_by, at)?;

            snapshots.push(LineSnapshot::capture(
                &product,
                line.quantity,
                draft.discount_percentage,
            )?);
        }

        let (suggested_total, final_total) = sale_totals(&snapshots)?;
        tx.execute(
            "INSERT INTO sales (
                location_id,
                sale_date,
                payment_method,
                discount_percentage,
                suggested_total,
                final_total,
                created_at,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                draft.location_id,
                millis(draft.sale_date),
                draft.payment_method.as_str(),
                draft.discount_percentage.to_string(),
                suggested_total.to_string(),
                final_total.to_string(),
                millis(at),
                draft.created_by.as_str(),
            ],
        )?;
        let sale_id = tx.last_insert_rowid();

        for snapshot in &snapshots {
            tx.execute(
                "INSERT INTO sale_product (
                    sale_id,
                    product_id,
                    quantity,
                    product_description_snapshot,
                    price_at_the_time,
                    wholesale_price_at_the_time,
                    suggested_price_at_the_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    sale_id,
                    snapshot.product_id,
                    snapshot.quantity.to_string(),
                    snapshot.description.as_str(),
                    snapshot.price.to_string(),
                    snapshot.wholesale_price.to_string(),
                    snapshot.suggested_price.to_string(),
                ],
            )?;
        }

        tx.commit()?;

        self.get_required(sale_id)
    }

    fn get_by_id(&self, id: SaleId) -> RepoResult<Option<Sale>> {
        self.conn
            .query_row(
                &format!("{SALE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_sale_row(row)),
            )
            .optional()?
            .transpose()
    }

    /// Updates header fields only: location, payment method and sale date.
    /// Totals and lines are fixed once recorded.
    fn update(&self, entity: &Sale) -> RepoResult<Sale> {
        let location = load_location(self.conn, entity.location_id)?.ok_or(RepoError::NotFound {
            entity: "location",
            id: entity.location_id,
        })?;
        if !location.is_active {
            return Err(RepoError::InactiveReference {
                entity: "location",
                id: location.id,
            });
        }

        let changed = self.conn.execute(
            "UPDATE sales
             SET
                location_id = ?1,
                payment_method = ?2,
                sale_date = ?3
             WHERE id = ?4;",
            params![
                entity.location_id,
                entity.payment_method.as_str(),
                millis(entity.sale_date),
                entity.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id: entity.id,
            });
        }

        self.get_required(entity.id)
    }

    fn delete(&self, id: SaleId) -> RepoResult<()> {
        self.delete_by(id, SYSTEM_ACTOR)
    }

    fn list(&self, query: &ListQuery<SaleField>) -> RepoResult<Page<Sale>> {
        fetch_page(
            self.conn,
            "sales",
            SALE_SELECT_SQL,
            query,
            "id ASC",
            parse_sale_row,
        )
    }
}

impl SaleRepository for SqliteSaleRepository<'_> {
    fn line_items(&self, sale_id: SaleId) -> RepoResult<Vec<SaleLineItem>> {
        load_line_items(self.conn, sale_id)
    }

    fn get_line_item(&self, id: SaleLineItemId) -> RepoResult<Option<SaleLineItem>> {
        self.conn
            .query_row(
                &format!("{LINE_ITEM_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_line_item_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn delete_by(&self, id: SaleId, actor: &str) -> RepoResult<()> {
        let tx = begin_immediate(self.conn)?;
        let sale_exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sales WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        if sale_exists == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id,
            });
        }

        let at = now();
        for line in load_line_items(&tx, id)? {
            let product = load_product(&tx, line.product_id)?.ok_or(RepoError::NotFound {
                entity: "product",
                id: line.product_id,
            })?;
            let units = units_or_overflow(product.id, line.quantity)?;
            let restored = product
                .stock
                .checked_add(units)
                .ok_or(RepoError::StockRule {
                    product_id: product.id,
                    source: StockRuleError::Overflow,
                })?;
            write_stock(&tx, product.id, restored, actor, at)?;
        }

        tx.execute("DELETE FROM sales WHERE id = ?1;", [id])?;
        tx.commit()?;
        Ok(())
    }
}

fn load_line_items(conn: &Connection, sale_id: SaleId) -> RepoResult<Vec<SaleLineItem>> {
    let mut stmt = conn.prepare(&format!(
        "{LINE_ITEM_SELECT_SQL} WHERE sale_id = ?1 ORDER BY id ASC;"
    ))?;
    let mut rows = stmt.query([sale_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_line_item_row(row)?);
    }
    Ok(items)
}

fn units_or_overflow(product_id: i64, quantity: Decimal) -> RepoResult<i64> {
    stock_units(quantity).ok_or(RepoError::StockRule {
        product_id,
        source: StockRuleError::Overflow,
    })
}

fn parse_sale_row(row: &Row<'_>) -> RepoResult<Sale> {
    Ok(Sale {
        id: row.get("id")?,
        location_id: row.get("location_id")?,
        sale_date: read_timestamp(row, "sale_date")?,
        payment_method: read_enum(row, "payment_method")?,
        discount_percentage: read_decimal(row, "discount_percentage")?,
        suggested_total: read_decimal(row, "suggested_total")?,
        final_total: read_decimal(row, "final_total")?,
        created_at: read_timestamp(row, "created_at")?,
        created_by: row.get("created_by")?,
    })
}

fn parse_line_item_row(row: &Row<'_>) -> RepoResult<SaleLineItem> {
    Ok(SaleLineItem {
        id: row.get("id")?,
        sale_id: row.get("sale_id")?,
        product_id: row.get("product_id")?,
        quantity: read_decimal(row, "quantity")?,
        product_description_snapshot: row.get("product_description_snapshot")?,
        price_at_the_time: read_decimal(row, "price_at_the_time")?,
        wholesale_price_at_the_time: read_decimal(row, "wholesale_price_at_the_time")?,
        suggested_price_at_the_time: read_decimal(row, "suggested_price_at_the_time")?,
    })
}
