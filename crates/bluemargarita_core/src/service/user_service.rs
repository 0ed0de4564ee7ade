//! User use-case service.
//!
//! # Responsibility
//! - Register and remove users on behalf of an admin principal.
//! - Expose username lookups without treating absence as an error.

use super::{map_repo_error, require_admin, ServiceResult};
use crate::error::EntityError;
use crate::model::user::{NewUser, Principal, Role, User, UserId};
use crate::repo::query::{ListQuery, Page};
use crate::repo::user_repo::{UserField, UserRepository};
use log::info;

const PREFIX: &str = "User";

pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new user. Admin only.
    pub fn register_user(
        &self,
        principal: &Principal,
        username: &str,
        role: Role,
    ) -> ServiceResult<User> {
        require_admin(principal, PREFIX, "register user")?;
        let draft = NewUser::new(username, role)
            .map_err(|err| EntityError::invalid_argument(PREFIX, err.to_string()))?;

        if self.username_exists(&draft.username)? {
            return Err(EntityError::already_exists(
                PREFIX,
                format!("username `{}` is already taken", draft.username),
            )
            .into());
        }

        let user = self
            .repo
            .create(&draft)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=user_register module=user status=ok user_id={} role={} actor={}",
            user.id, user.role, principal.username
        );
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.repo
            .get_required(id)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        self.repo
            .find_by_username(username)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Exact, case-sensitive existence check.
    pub fn username_exists(&self, username: &str) -> ServiceResult<bool> {
        self.repo
            .exists_by_username(username)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    pub fn list_users(&self, query: &ListQuery<UserField>) -> ServiceResult<Page<User>> {
        self.repo
            .list(query)
            .map_err(|err| map_repo_error(PREFIX, err))
    }

    /// Permanently removes a user. Admin only.
    pub fn delete_user(&self, principal: &Principal, id: UserId) -> ServiceResult<()> {
        require_admin(principal, PREFIX, "delete user")?;
        self.repo
            .delete(id)
            .map_err(|err| map_repo_error(PREFIX, err))?;
        info!(
            "event=user_delete module=user status=ok user_id={id} actor={}",
            principal.username
        );
        Ok(())
    }
}
