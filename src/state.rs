//! Shared application state for all routes. The catalog is an immutable snapshot built at startup.

use crate::config::Catalog;
use crate::service::EntityEngine;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(pool: PgPool, catalog: Catalog) -> Self {
        AppState {
            pool,
            catalog: Arc::new(catalog),
        }
    }

    pub fn engine(&self) -> EntityEngine {
        EntityEngine::new(self.catalog.clone())
    }
}
