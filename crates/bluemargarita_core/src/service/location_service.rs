//! Location use-case service.
//!
//! # Responsibility
//! - Create, rename, list and soft-delete locations.
//! - Restore soft-deleted locations on admin request.
//!
//! # Invariants
//! - Names stay unique case-insensitively, deleted rows included.
//! - Deleted locations cannot be renamed until restored.

use super::{map_repo_error, require_admin, ServiceResult};
use crate::error::EntityError;
use crate::model::location::{normalize_location_name, Location, LocationId, NewLocation};
use crate::model::now;
use crate::model::user::Principal;
use crate::repo::location_repo::{LocationField, LocationRepository};
use crate::repo::query::{ListQuery, Page};
use log::info;

const PREFIX: &str = "Location";

pub struct LocationService<R: LocationRepository> {
    repo: R,
}

impl<R: LocationRepository> LocationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_location(&self, principal: &Principal, name: &str) -> ServiceResult<Location> {
        let draft = NewLocation::new(name, &principal.username)
            .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;
        self.ensure_name_free(&draft.name, None)?;

        let location = self
            .repo
            .create(&draft)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=location_create module=location status=ok location_id={} actor={}",
            location.id, principal.username
        );
        Ok(location)
    }

    /// Renames an active location.
    pub fn update_location(
        &self,
        principal: &Principal,
        id: LocationId,
        name: &str,
    ) -> ServiceResult<Location> {
        let name = normalize_location_name(name)
            .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;
        let mut location = self.get_location(id)?;
        if !location.is_active {
            return Err(EntityError::invalid_argument(
                PREFIX,
                format!("location {id} is deleted; restore it before editing"),
            )
            .into());
        }
        self.ensure_name_free(&name, Some(id))?;

        location.name = name;
        location.updated_at = now();
        location.last_updated_by = principal.username.clone();
        let location = self
            .repo
            .update(&location)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=location_update module=location status=ok location_id={id} actor={}",
            principal.username
        );
        Ok(location)
    }

    pub fn get_location(&self, id: LocationId) -> ServiceResult<Location> {
        self.repo
            .get_required(id)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    pub fn list_locations(
        &self,
        query: &ListQuery<LocationField>,
    ) -> ServiceResult<Page<Location>> {
        self.repo
            .list(query)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Soft-deletes a location. Admin only.
    pub fn delete_location(&self, principal: &Principal, id: LocationId) -> ServiceResult<Location> {
        require_admin(principal, PREFIX, "delete location")?;
        let mut location = self.get_location(id)?;
        location.soft_delete(now(), &principal.username);
        let location = self
            .repo
            .update(&location)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=location_delete module=location status=ok location_id={id} actor={}",
            principal.username
        );
        Ok(location)
    }

    /// Clears a location's tombstone. Admin only.
    pub fn restore_location(
        &self,
        principal: &Principal,
        id: LocationId,
    ) -> ServiceResult<Location> {
        require_admin(principal, PREFIX, "restore location")?;
        let mut location = self.get_location(id)?;
        location.restore(now(), &principal.username);
        let location = self
            .repo
            .update(&location)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=location_restore module=location status=ok location_id={id} actor={}",
            principal.username
        );
        Ok(location)
    }

    fn ensure_name_free(&self, name: &str, owner: Option<LocationId>) -> ServiceResult<()> {
        let existing = self
            .repo
            .find_by_name(name)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        match existing {
            Some(location) if Some(location.id) != owner => Err(EntityError::already_exists(
                PREFIX,
                format!("location name `{name}` is already in use"),
            )
            .into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;
    use crate::repo::location_repo::SqliteLocationRepository;

    #[test]
    fn rename_to_own_name_in_other_case_is_allowed() {
        let conn = open_db_in_memory().unwrap();
        let service = LocationService::new(SqliteLocationRepository::try_new(&conn).unwrap());
        let clerk = Principal::user("clerk");

        let created = service.create_location(&clerk, "Harbour Kiosk").unwrap();
        let renamed = service
            .update_location(&clerk, created.id, "harbour kiosk")
            .unwrap();
        assert_eq!(renamed.name, "harbour kiosk");
        assert_eq!(renamed.last_updated_by, "clerk");
    }

    #[test]
    fn deleted_location_cannot_be_renamed() {
        let conn = open_db_in_memory().unwrap();
        let service = LocationService::new(SqliteLocationRepository::try_new(&conn).unwrap());
        let admin = Principal::admin("root");

        let created = service.create_location(&admin, "Old Depot").unwrap();
        service.delete_location(&admin, created.id).unwrap();
        let err = service
            .update_location(&admin, created.id, "New Depot")
            .unwrap_err();
        assert_eq!(err.code(), Some("LocationInvalidArgument"));
    }
}
