//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce role checks for admin-only operations.
//! - Translate storage failures with domain meaning into `EntityError`.
//!
//! # Invariants
//! - Every domain-rule failure surfaces as exactly one `EntityError` kind.
//! - Storage failures without domain meaning stay `ServiceError::Storage`.

use crate::error::EntityError;
use crate::model::user::Principal;
use crate::repo::RepoError;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod location_service;
pub mod product_service;
pub mod sale_service;
pub mod stock_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure returned by every service operation.
#[derive(Debug)]
pub enum ServiceError {
    /// Domain-rule violation with a stable code.
    Entity(EntityError),
    /// Storage failure with no domain meaning.
    Storage(RepoError),
}

impl ServiceError {
    /// Domain error, if this failure is one.
    pub fn entity(&self) -> Option<&EntityError> {
        match self {
            Self::Entity(err) => Some(err),
            Self::Storage(_) => None,
        }
    }

    /// Stable code of a domain error.
    pub fn code(&self) -> Option<&str> {
        self.entity().map(|err| err.code.as_str())
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Entity(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<EntityError> for ServiceError {
    fn from(value: EntityError) -> Self {
        Self::Entity(value)
    }
}

/// Maps a repository error into the service taxonomy under `prefix`.
pub(crate) fn map_repo_error(prefix: &str, err: RepoError) -> ServiceError {
    match err {
        RepoError::Validation(err) => EntityError::invalid_argument(prefix, err.to_string()).into(),
        RepoError::StockRule { product_id, source } => {
            EntityError::invalid_argument(prefix, format!("product {product_id}: {source}")).into()
        }
        RepoError::NotFound { entity, id } => {
            EntityError::not_found(prefix, format!("{entity} not found: {id}")).into()
        }
        RepoError::Duplicate { entity, detail } => {
            EntityError::already_exists(prefix, format!("{entity} already exists: {detail}"))
                .into()
        }
        RepoError::InactiveReference { entity, id } => {
            EntityError::invalid_argument(prefix, format!("{entity} {id} is not active")).into()
        }
        other => ServiceError::Storage(other),
    }
}

/// Rejects non-admin principals for `action`.
pub(crate) fn require_admin(principal: &Principal, prefix: &str, action: &str) -> ServiceResult<()> {
    if principal.is_admin() {
        return Ok(());
    }
    warn!(
        "event=authorization module=service status=denied action={action} principal={}",
        principal.username
    );
    Err(EntityError::not_authorized(
        prefix,
        format!("{action} requires the ADMIN role"),
    )
    .into())
}
