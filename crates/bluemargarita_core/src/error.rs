//! Domain error taxonomy shared by every service.
//!
//! # Responsibility
//! - Represent rule violations as one tagged type with a stable `code`.
//! - Build codes from a caller-supplied prefix plus a fixed per-kind suffix.
//!
//! # Invariants
//! - `code == prefix + kind.suffix()` for every constructed error.
//! - `message` is kept verbatim and is meant for display/logging only.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure category for domain-rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityErrorKind {
    /// The operation would duplicate a uniquely identified resource.
    AlreadyExists,
    /// The acting principal lacks permission for the operation.
    NotAuthorized,
    /// Caller input is malformed, out of range or inconsistent.
    InvalidArgument,
    /// The addressed resource does not exist.
    NotFound,
}

impl EntityErrorKind {
    /// Fixed suffix appended to the caller prefix to form the final code.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::AlreadyExists => "AlreadyExists",
            Self::NotAuthorized => "NotAuthorized",
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
        }
    }
}

/// Typed domain failure carrying a machine-readable code and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityError {
    pub kind: EntityErrorKind,
    pub code: String,
    pub message: String,
}

impl EntityError {
    /// Builds an error of `kind`, appending the kind suffix to `prefix`.
    pub fn new(kind: EntityErrorKind, prefix: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: format!("{prefix}{}", kind.suffix()),
            message: message.into(),
        }
    }

    pub fn already_exists(prefix: &str, message: impl Into<String>) -> Self {
        Self::new(EntityErrorKind::AlreadyExists, prefix, message)
    }

    pub fn not_authorized(prefix: &str, message: impl Into<String>) -> Self {
        Self::new(EntityErrorKind::NotAuthorized, prefix, message)
    }

    pub fn invalid_argument(prefix: &str, message: impl Into<String>) -> Self {
        Self::new(EntityErrorKind::InvalidArgument, prefix, message)
    }

    pub fn not_found(prefix: &str, message: impl Into<String>) -> Self {
        Self::new(EntityErrorKind::NotFound, prefix, message)
    }
}

impl Display for EntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for EntityError {}
