//! Elemental: a generic entity engine over PostgreSQL. Table-name conventions
//! (`user_has_<t>`, `<t>_is_<d>`, `<t>_has_<r>`) decide ownership, combinations and relations.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod user;

pub use config::{apply_ownership_fields, load_from_pool, load_manifest, resolve, Catalog, Settings, TableShape};
pub use error::{AppError, ConfigError};
pub use routes::{app, common_routes, entity_routes};
pub use service::{CrudService, EntityEngine, SqlExecutor, UpdateOptions};
pub use state::AppState;
pub use user::UserContext;
