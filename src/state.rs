//! Shared application state for all routes.

use crate::catalog::Catalog;
use crate::routes::RouteTable;
use crate::service::UploadStore;
use crate::settings::Settings;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<Catalog>,
    pub settings: Arc<Settings>,
    pub uploads: Arc<dyn UploadStore>,
    /// Named routes, built once from the catalog.
    pub routes: Arc<RouteTable>,
}

impl AppState {
    pub fn new(pool: PgPool, catalog: Catalog, settings: Settings, uploads: Arc<dyn UploadStore>) -> Self {
        let routes = RouteTable::from_catalog(&catalog);
        AppState {
            pool,
            catalog: Arc::new(catalog),
            settings: Arc::new(settings),
            uploads,
            routes: Arc::new(routes),
        }
    }
}
