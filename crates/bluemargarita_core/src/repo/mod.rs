//! Storage-access contracts and their SQLite implementations.
//!
//! # Responsibility
//! - Define the generic `Repository<T, Id>` contract shared by all entities.
//! - Isolate SQL and column encoding from the service layer.
//!
//! # Invariants
//! - Write paths validate records before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Related rows are loaded by explicit calls, never implicitly.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::stock::StockRuleError;
use crate::model::ValidationError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub mod location_repo;
pub mod product_repo;
pub mod query;
pub mod sale_repo;
pub mod user_repo;

use query::{FilterField, ListQuery, Page};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    /// A stock mutation broke the stock rules for `product_id`.
    StockRule {
        product_id: i64,
        source: StockRuleError,
    },
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: i64,
    },
    /// A unique key is already taken.
    Duplicate {
        entity: &'static str,
        detail: String,
    },
    /// A referenced row exists but is soft-deleted or deactivated.
    InactiveReference {
        entity: &'static str,
        id: i64,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::StockRule { product_id, source } => {
                write!(f, "product {product_id}: {source}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate { entity, detail } => write!(f, "{entity} already exists: {detail}"),
            Self::InactiveReference { entity, id } => write!(f, "{entity} {id} is not active"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StockRule { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Generic identifier-based storage access for one entity type.
///
/// `Draft` is the insert shape; `Field` names the filterable columns.
pub trait Repository<T, Id: Copy + Into<i64>> {
    type Draft;
    type Field: FilterField;

    /// Entity name used in not-found and duplicate errors.
    const ENTITY: &'static str;

    fn create(&self, draft: &Self::Draft) -> RepoResult<T>;
    fn get_by_id(&self, id: Id) -> RepoResult<Option<T>>;
    /// Persists `entity` and returns the stored row.
    fn update(&self, entity: &T) -> RepoResult<T>;
    fn delete(&self, id: Id) -> RepoResult<()>;
    fn list(&self, query: &ListQuery<Self::Field>) -> RepoResult<Page<T>>;

    /// Like `get_by_id`, but absence is `RepoError::NotFound`.
    fn get_required(&self, id: Id) -> RepoResult<T> {
        self.get_by_id(id)?.ok_or(RepoError::NotFound {
            entity: Self::ENTITY,
            id: id.into(),
        })
    }
}

/// Table and columns a repository needs on its connection.
pub(crate) struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// Rejects connections that are unmigrated or lack required schema.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[TableSpec]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table.name)? {
            return Err(RepoError::MissingRequiredTable(table.name));
        }
        for column in table.columns {
            if !table_has_column(conn, table.name, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: table.name,
                    column,
                });
            }
        }
    }

    Ok(())
}

/// Starts a write transaction that takes the database write lock up front.
///
/// Concurrent read-modify-write calls on other connections wait on the
/// busy timeout instead of interleaving.
pub(crate) fn begin_immediate(conn: &Connection) -> RepoResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

/// Maps a unique-constraint failure to `RepoError::Duplicate`.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    entity: &'static str,
    detail: impl FnOnce() -> String,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepoError::Duplicate {
                entity,
                detail: detail(),
            }
        }
        _ => err.into(),
    }
}

pub(crate) fn millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn read_timestamp(row: &Row<'_>, column: &str) -> RepoResult<DateTime<Utc>> {
    let value: i64 = row.get(column)?;
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn read_optional_timestamp(
    row: &Row<'_>,
    column: &str,
) -> RepoResult<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(_) => read_timestamp(row, column).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn read_decimal(row: &Row<'_>, column: &str) -> RepoResult<Decimal> {
    let text: String = row.get(column)?;
    Decimal::from_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid decimal `{text}` in {column}")))
}

pub(crate) fn read_bool(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn read_enum<E: FromStr>(row: &Row<'_>, column: &str) -> RepoResult<E> {
    let text: String = row.get(column)?;
    text.parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{text}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
