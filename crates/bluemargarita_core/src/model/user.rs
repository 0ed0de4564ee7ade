//! User accounts and the acting principal.
//!
//! # Invariants
//! - `username` is unique and matches `USERNAME_PATTERN`.

use super::ValidationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type UserId = i64;

const USERNAME_PATTERN: &str = r"^[A-Za-z0-9._-]{3,50}$";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(USERNAME_PATTERN).expect("valid username regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => Err(ValidationError::new(
                "role",
                format!("unknown role `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userId")]
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)
    }
}

impl NewUser {
    pub fn new(username: &str, role: Role) -> Result<Self, ValidationError> {
        let username = username.trim();
        validate_username(username)?;
        Ok(Self {
            username: username.to_string(),
            role,
        })
    }
}

/// Identity of the caller performing an operation.
///
/// Supplied by the surrounding authentication layer; the core trusts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin)
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self::new(username, Role::User)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "username",
            "must be 3-50 characters of letters, digits, '.', '_' or '-'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(NewUser::new(" alice ", Role::User).is_ok());
        assert!(NewUser::new("al", Role::User).is_err());
        assert!(NewUser::new("alice smith", Role::User).is_err());
        assert!(NewUser::new("maria.k_01-x", Role::Admin).is_ok());
    }

    #[test]
    fn role_text_roundtrip() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("OWNER".parse::<Role>().is_err());
    }
}
