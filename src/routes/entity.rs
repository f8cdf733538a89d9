//! Entity routes. Paths are parameterized; handlers resolve the table against the catalog.

use crate::handlers::{entity, relation};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(entity::list).post(entity::create))
        .route("/:table/deleted", get(entity::list_deleted))
        .route(
            "/:table/:id",
            get(entity::read).put(entity::update).delete(entity::delete),
        )
        .route("/:table/:id/ownership", get(entity::ownership))
        .route("/:table/:id/clone", post(entity::clone))
        .route("/:table/:id/revive", put(entity::revive))
        .route("/:table/:id/canon/:value", put(entity::set_canon))
        .route(
            "/:table/:id/relations/:relation",
            get(relation::list).post(relation::add),
        )
        .route(
            "/:table/:id/relations/:relation/:related_id",
            put(relation::set_value).delete(relation::remove),
        )
        .with_state(state)
}
