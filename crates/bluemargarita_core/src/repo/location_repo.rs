//! Location repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Names are unique case-insensitively, including soft-deleted rows.
//! - `delete` is a soft delete; rows are never physically removed.

use super::query::{fetch_page, FilterField, ListQuery, Page};
use super::{
    bool_to_int, ensure_connection_ready, map_unique_violation, millis, read_bool,
    read_optional_timestamp, read_timestamp, RepoError, RepoResult, Repository, TableSpec,
};
use crate::model::location::{Location, LocationId, NewLocation};
use crate::model::now;
use rusqlite::{params, Connection, OptionalExtension, Row};

const LOCATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    created_at,
    updated_at,
    created_by,
    last_updated_by,
    is_active,
    deleted_at
FROM locations";

const LOCATION_TABLE: TableSpec = TableSpec {
    name: "locations",
    columns: &[
        "id",
        "name",
        "created_at",
        "updated_at",
        "created_by",
        "last_updated_by",
        "is_active",
        "deleted_at",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationField {
    Id,
    Name,
    IsActive,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

impl FilterField for LocationField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::IsActive => "is_active",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::DeletedAt => "deleted_at",
        }
    }
}

pub trait LocationRepository:
    Repository<Location, LocationId, Draft = NewLocation, Field = LocationField>
{
    /// Case-insensitive name lookup, deleted rows included.
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Location>>;
    fn exists_by_name(&self, name: &str) -> RepoResult<bool>;
}

pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[LOCATION_TABLE])?;
        Ok(Self { conn })
    }
}

impl Repository<Location, LocationId> for SqliteLocationRepository<'_> {
    type Draft = NewLocation;
    type Field = LocationField;

    const ENTITY: &'static str = "location";

    fn create(&self, draft: &NewLocation) -> RepoResult<Location> {
        let at = now();
        let location = Location {
            id: 0,
            name: draft.name.clone(),
            created_at: at,
            updated_at: at,
            created_by: draft.created_by.clone(),
            last_updated_by: draft.created_by.clone(),
            is_active: true,
            deleted_at: None,
        };
        location.validate()?;

        self.conn
            .execute(
                "INSERT INTO locations (
                    name,
                    created_at,
                    updated_at,
                    created_by,
                    last_updated_by,
                    is_active,
                    deleted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL);",
                params![
                    location.name.as_str(),
                    millis(location.created_at),
                    millis(location.updated_at),
                    location.created_by.as_str(),
                    location.last_updated_by.as_str(),
                    bool_to_int(location.is_active),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || format!("name `{}`", location.name))
            })?;

        Ok(Location {
            id: self.conn.last_insert_rowid(),
            ..location
        })
    }

    fn get_by_id(&self, id: LocationId) -> RepoResult<Option<Location>> {
        load_location(self.conn, id)
    }

    fn update(&self, entity: &Location) -> RepoResult<Location> {
        entity.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE locations
                 SET
                    name = ?1,
                    updated_at = ?2,
                    last_updated_by = ?3,
                    is_active = ?4,
                    deleted_at = ?5
                 WHERE id = ?6;",
                params![
                    entity.name.as_str(),
                    millis(entity.updated_at),
                    entity.last_updated_by.as_str(),
                    bool_to_int(entity.is_active),
                    entity.deleted_at.map(millis),
                    entity.id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || format!("name `{}`", entity.name))
            })?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id: entity.id,
            });
        }

        self.get_required(entity.id)
    }

    fn delete(&self, id: LocationId) -> RepoResult<()> {
        let at = millis(now());
        let changed = self.conn.execute(
            "UPDATE locations
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

    fn list(&self, query: &ListQuery<LocationField>) -> RepoResult<Page<Location>> {
        fetch_page(
            self.conn,
            "locations",
            LOCATION_SELECT_SQL,
            query,
            "id ASC",
            parse_location_row,
        )
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Location>> {
        self.conn
            .query_row(
                &format!("{LOCATION_SELECT_SQL} WHERE name = ?1;"),
                [name],
                |row| Ok(parse_location_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM locations WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

/// Loads one location on any connection or open transaction.
pub(crate) fn load_location(conn: &Connection, id: LocationId) -> RepoResult<Option<Location>> {
    conn.query_row(
        &format!("{LOCATION_SELECT_SQL} WHERE id = ?1;"),
        [id],
        |row| Ok(parse_location_row(row)),
    )
    .optional()?
    .transpose()
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<Location> {
    let location = Location {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: read_timestamp(row, "created_at")?,
        updated_at: read_timestamp(row, "updated_at")?,
        created_by: row.get("created_by")?,
        last_updated_by: row.get("last_updated_by")?,
        is_active: read_bool(row, "is_active")?,
        deleted_at: read_optional_timestamp(row, "deleted_at")?,
    };
    location.validate()?;
    Ok(location)
}
