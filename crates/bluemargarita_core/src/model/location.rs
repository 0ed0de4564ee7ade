//! Location read-model.
//!
//! # Invariants
//! - `deleted_at` is set iff `is_active == false`.
//! - `name` is trimmed and unique case-insensitively in storage.

use super::{normalize_required_text, validate_soft_delete_state, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LocationId = i64;

pub const LOCATION_NAME_MAX_CHARS: usize = 155;

/// Point of sale or storage site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "locationId")]
    pub id: LocationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_updated_by: String,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Insert shape for a new location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocation {
    pub name: String,
    pub created_by: String,
}

impl Location {
    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_location_name(&self.name)?;
        validate_soft_delete_state(self.is_active, self.deleted_at)
    }

    /// Tombstones this location. Already-deleted locations keep their
    /// original `deleted_at`.
    pub fn soft_delete(&mut self, at: DateTime<Utc>, actor: &str) {
        if self.is_active {
            self.is_active = false;
            self.deleted_at = Some(at);
        }
        self.touch(at, actor);
    }

    /// Clears the tombstone.
    pub fn restore(&mut self, at: DateTime<Utc>, actor: &str) {
        self.is_active = true;
        self.deleted_at = None;
        self.touch(at, actor);
    }

    fn touch(&mut self, at: DateTime<Utc>, actor: &str) {
        self.updated_at = at;
        self.last_updated_by = actor.to_string();
    }
}

impl NewLocation {
    pub fn new(name: &str, created_by: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: normalize_location_name(name)?,
            created_by: created_by.to_string(),
        })
    }
}

pub fn normalize_location_name(name: &str) -> Result<String, ValidationError> {
    normalize_required_text("name", name, LOCATION_NAME_MAX_CHARS)
}
