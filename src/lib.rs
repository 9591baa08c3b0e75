//! medcms: content-management admin backend. Entity catalog, migrations, JSON page props,
//! validation, uniqueness checks, image uploads and CSV export over PostgreSQL.

pub mod catalog;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use catalog::{cms_catalog, resolve, Catalog, ResolvedEntity};
pub use error::{AppError, CatalogError};
pub use migration::apply_migrations;
pub use response::{success_many, success_one};
pub use routes::{app, common_routes, entity_routes, RouteTable};
pub use service::{build_store, CrudService, UploadStore};
pub use settings::{Settings, SettingsError, UploadBackend};
pub use state::AppState;
pub use store::ensure_database_exists;
