//! Composable filters, sorting and pagination for repository listings.
//!
//! # Responsibility
//! - Express list filters as typed predicates over per-entity fields.
//! - Render predicates into parameterized SQL; values are always bound.
//!
//! # Invariants
//! - Field names come from `FilterField::column`, never from caller text.
//! - Pages are zero-based; page size defaults to 20 and clamps to 1..=100.

use super::RepoResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Column that a listing may filter or sort on.
pub trait FilterField: Copy {
    fn column(self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    fn to_sql_value(&self) -> Value {
        match self {
            Self::Integer(value) => Value::Integer(*value),
            Self::Text(value) => Value::Text(value.clone()),
            Self::Bool(value) => Value::Integer(i64::from(*value)),
            Self::Timestamp(value) => Value::Integer(value.timestamp_millis()),
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Boolean filter expression over the fields `F` of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate<F> {
    Compare {
        field: F,
        op: Comparison,
        value: FilterValue,
    },
    /// Compares two columns of the same row.
    CompareFields {
        left: F,
        op: Comparison,
        right: F,
    },
    /// Case-insensitive substring match.
    Contains {
        field: F,
        needle: String,
    },
    IsNull(F),
    NotNull(F),
    /// Empty conjunction matches every row.
    And(Vec<Predicate<F>>),
    /// Empty disjunction matches no row.
    Or(Vec<Predicate<F>>),
    Not(Box<Predicate<F>>),
}

impl<F: FilterField> Predicate<F> {
    pub fn compare(field: F, op: Comparison, value: impl Into<FilterValue>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn ne(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    pub fn gt(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    pub fn gte(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Gte, value)
    }

    pub fn lt(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn lte(field: F, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, Comparison::Lte, value)
    }

    pub fn fields(left: F, op: Comparison, right: F) -> Self {
        Self::CompareFields { left, op, right }
    }

    pub fn contains(field: F, needle: impl Into<String>) -> Self {
        Self::Contains {
            field,
            needle: needle.into(),
        }
    }

    pub fn is_null(field: F) -> Self {
        Self::IsNull(field)
    }

    pub fn not_null(field: F) -> Self {
        Self::NotNull(field)
    }

    pub fn all(predicates: impl IntoIterator<Item = Self>) -> Self {
        Self::And(predicates.into_iter().collect())
    }

    pub fn any(predicates: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(predicates.into_iter().collect())
    }

    /// Conjunction; nested `And`s are flattened.
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction; nested `Or`s are flattened.
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub(crate) fn write_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::Compare { field, op, value } => {
                sql.push_str(&format!("{} {} ?", field.column(), op.sql()));
                binds.push(value.to_sql_value());
            }
            Self::CompareFields { left, op, right } => {
                sql.push_str(&format!(
                    "{} {} {}",
                    left.column(),
                    op.sql(),
                    right.column()
                ));
            }
            Self::Contains { field, needle } => {
                sql.push_str(&format!("{} LIKE ? ESCAPE '\\'", field.column()));
                binds.push(Value::Text(format!("%{}%", escape_like(needle))));
            }
            Self::IsNull(field) => sql.push_str(&format!("{} IS NULL", field.column())),
            Self::NotNull(field) => sql.push_str(&format!("{} IS NOT NULL", field.column())),
            Self::And(items) => write_group(items, " AND ", "1 = 1", sql, binds),
            Self::Or(items) => write_group(items, " OR ", "1 = 0", sql, binds),
            Self::Not(inner) => {
                sql.push_str("NOT (");
                inner.write_sql(sql, binds);
                sql.push(')');
            }
        }
    }
}

fn write_group<F: FilterField>(
    items: &[Predicate<F>],
    joiner: &str,
    empty: &str,
    sql: &mut String,
    binds: &mut Vec<Value>,
) {
    if items.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            sql.push_str(joiner);
        }
        item.write_sql(sql, binds);
    }
    sql.push(')');
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, sort and page selection for `Repository::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery<F> {
    pub filter: Option<Predicate<F>>,
    pub sort_by: Option<F>,
    pub direction: SortDirection,
    /// Zero-based page index.
    pub page: u32,
    /// Defaults to 20 and clamps to 100.
    pub page_size: Option<u32>,
}

impl<F> Default for ListQuery<F> {
    fn default() -> Self {
        Self {
            filter: None,
            sort_by: None,
            direction: SortDirection::Asc,
            page: 0,
            page_size: None,
        }
    }
}

impl<F: FilterField> ListQuery<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `predicate`, AND-ing it with any filter already present.
    pub fn filter(mut self, predicate: Predicate<F>) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn sort(mut self, field: F, direction: SortDirection) -> Self {
        self.sort_by = Some(field);
        self.direction = direction;
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    pub fn applied_page_size(&self) -> u32 {
        normalize_page_size(self.page_size)
    }
}

pub fn normalize_page_size(page_size: Option<u32>) -> u32 {
    match page_size {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(value) => value.min(MAX_PAGE_SIZE),
    }
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }
}

/// Runs a filtered, sorted, paginated listing against one table.
///
/// `select_sql` must be `SELECT <columns> FROM <table>` without a WHERE
/// clause; `tie_breaker` keeps ordering stable across pages.
pub(crate) fn fetch_page<T, F: FilterField>(
    conn: &Connection,
    table: &str,
    select_sql: &str,
    query: &ListQuery<F>,
    tie_breaker: &str,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Page<T>> {
    let mut where_sql = String::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(filter) = query.filter.as_ref() {
        where_sql.push_str(" WHERE ");
        filter.write_sql(&mut where_sql, &mut binds);
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table}{where_sql};"),
        params_from_iter(binds.iter()),
        |row| row.get(0),
    )?;
    let total_elements = u64::try_from(total).unwrap_or(0);

    let page_size = query.applied_page_size();
    let mut sql = format!("{select_sql}{where_sql} ORDER BY ");
    if let Some(field) = query.sort_by {
        sql.push_str(&format!("{} {}, ", field.column(), query.direction.sql()));
    }
    sql.push_str(tie_breaker);
    sql.push_str(" LIMIT ? OFFSET ?;");
    binds.push(Value::Integer(i64::from(page_size)));
    binds.push(Value::Integer(
        i64::from(query.page).saturating_mul(i64::from(page_size)),
    ));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds.iter()))?;
    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        data.push(parse(row)?);
    }

    let total_pages = u32::try_from(total_elements.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
    Ok(Page {
        data,
        total_elements,
        total_pages,
        current_page: query.page,
        page_size,
    })
}
