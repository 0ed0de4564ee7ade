//! Core inventory and sales logic for Blue Margarita.
//! This crate is the single source of truth for stock and sale invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{EntityError, EntityErrorKind};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::location::{Location, LocationId, NewLocation};
pub use model::product::{NewProduct, Product, ProductId};
pub use model::sale::{
    NewSale, NewSaleLine, PaymentMethod, Sale, SaleId, SaleLineItem, SaleLineItemId,
};
pub use model::stock::{StockOperation, StockPolicy, StockUpdateRequest, StockUpdateResult};
pub use model::user::{NewUser, Principal, Role, User, UserId};
pub use model::ValidationError;
pub use repo::location_repo::{LocationField, LocationRepository, SqliteLocationRepository};
pub use repo::product_repo::{ProductField, ProductRepository, SqliteProductRepository};
pub use repo::query::{Comparison, FilterValue, ListQuery, Page, Predicate, SortDirection};
pub use repo::sale_repo::{SaleField, SaleRepository, SqliteSaleRepository};
pub use repo::user_repo::{SqliteUserRepository, UserField, UserRepository};
pub use repo::{RepoError, RepoResult, Repository};
pub use service::location_service::LocationService;
pub use service::product_service::{
    LowStockFilter, MispricedFilter, ProductDetails, ProductService,
};
pub use service::sale_service::{
    LineItemWithProduct, SaleDetails, SaleHeaderUpdate, SaleRequest, SaleService,
};
pub use service::stock_service::StockService;
pub use service::user_service::UserService;
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
