//! Entity engine over any `SqlExecutor`, plus the pool-level `CrudService`.

mod crud;
mod engine;
mod executor;
mod ownership;
mod reads;
mod relations;
#[cfg(test)]
pub(crate) mod testing;

pub use crud::CrudService;
pub use engine::{EntityEngine, UpdateOptions};
pub use executor::SqlExecutor;
pub use ownership::{verify_multiple_ownership, verify_ownership};
pub use reads::{ListQuery, DEFAULT_LIMIT, MAX_LIMIT};
