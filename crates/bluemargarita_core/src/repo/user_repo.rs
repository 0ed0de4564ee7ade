//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Username lookups are exact, case-sensitive matches.
//! - Absence is reported as `None`/`false`, never as an error.
//! - Users are hard-deleted.

use super::query::{fetch_page, FilterField, ListQuery, Page};
use super::{
    bool_to_int, ensure_connection_ready, map_unique_violation, millis, read_bool, read_enum,
    read_timestamp, RepoError, RepoResult, Repository, TableSpec,
};
use crate::model::now;
use crate::model::user::{NewUser, User, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    role,
    is_active,
    created_at,
    updated_at
FROM users";

const USER_TABLE: TableSpec = TableSpec {
    name: "users",
    columns: &[
        "id",
        "username",
        "role",
        "is_active",
        "created_at",
        "updated_at",
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Username,
    Role,
    IsActive,
    CreatedAt,
}

impl FilterField for UserField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Username => "username",
            Self::Role => "role",
            Self::IsActive => "is_active",
            Self::CreatedAt => "created_at",
        }
    }
}

/// User storage access with username lookups.
pub trait UserRepository: Repository<User, UserId, Draft = NewUser, Field = UserField> {
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn exists_by_username(&self, username: &str) -> RepoResult<bool>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[USER_TABLE])?;
        Ok(Self { conn })
    }
}

impl Repository<User, UserId> for SqliteUserRepository<'_> {
    type Draft = NewUser;
    type Field = UserField;

    const ENTITY: &'static str = "user";

    fn create(&self, draft: &NewUser) -> RepoResult<User> {
        let at = now();
        let user = User {
            id: 0,
            username: draft.username.clone(),
            role: draft.role,
            is_active: true,
            created_at: at,
            updated_at: at,
        };
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO users (username, role, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    user.username.as_str(),
                    user.role.as_str(),
                    bool_to_int(user.is_active),
                    millis(user.created_at),
                    millis(user.updated_at),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || {
                    format!("username `{}`", user.username)
                })
            })?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            ..user
        })
    }

    fn get_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn update(&self, entity: &User) -> RepoResult<User> {
        entity.validate()?;
        let updated_at = now();

        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET
                    username = ?1,
                    role = ?2,
                    is_active = ?3,
                    updated_at = ?4
                 WHERE id = ?5;",
                params![
                    entity.username.as_str(),
                    entity.role.as_str(),
                    bool_to_int(entity.is_active),
                    millis(updated_at),
                    entity.id,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, Self::ENTITY, || {
                    format!("username `{}`", entity.username)
                })
            })?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id: entity.id,
            });
        }

        self.get_required(entity.id)
    }

    fn delete(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Self::ENTITY,
                id,
            });
        }
        Ok(())
    }

    fn list(&self, query: &ListQuery<UserField>) -> RepoResult<Page<User>> {
        fetch_page(
            self.conn,
            "users",
            USER_SELECT_SQL,
            query,
            "id ASC",
            parse_user_row,
        )
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE username = ?1;"),
                [username],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn exists_by_username(&self, username: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let user = User {
        id: row.get("id")?,
        username: row.get("username")?,
        role: read_enum(row, "role")?,
        is_active: read_bool(row, "is_active")?,
        created_at: read_timestamp(row, "created_at")?,
        updated_at: read_timestamp(row, "updated_at")?,
    };
    user.validate()?;
    Ok(user)
}
