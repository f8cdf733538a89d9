//! Pool-level entry points: each call runs one engine operation inside its own transaction.

use crate::error::AppError;
use crate::service::engine::{EntityEngine, UpdateOptions};
use crate::service::reads::ListQuery;
use crate::user::UserContext;
use serde_json::{Map, Value};
use sqlx::PgPool;

pub struct CrudService;

impl CrudService {
    pub async fn list(pool: &PgPool, engine: &EntityEngine, table: &str, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let mut conn = pool.acquire().await?;
        engine.list(&mut *conn, table, query).await
    }

    pub async fn read(pool: &PgPool, engine: &EntityEngine, table: &str, id: i64) -> Result<Value, AppError> {
        let mut conn = pool.acquire().await?;
        engine.read(&mut *conn, table, id).await
    }

    /// Whether `user` owns row `id` of `table`.
    pub async fn ownership(pool: &PgPool, engine: &EntityEngine, user: &UserContext, table: &str, id: i64) -> Result<bool, AppError> {
        let mut conn = pool.acquire().await?;
        engine.is_owner(&mut *conn, user, table, id).await
    }

    /// Create in a transaction. Returns the new id.
    pub async fn create(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        body: &Map<String, Value>,
    ) -> Result<i64, AppError> {
        let fields = ownership_fields(engine, table);
        let mut tx = pool.begin().await?;
        let id = engine.create(&mut *tx, user, body, table, &fields).await?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn update(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let options = UpdateOptions {
            ownership_fields: ownership_fields(engine, table),
            touch_updated: true,
        };
        let mut tx = pool.begin().await?;
        engine.update(&mut *tx, user, body, table, id, &options).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn soft_delete(pool: &PgPool, engine: &EntityEngine, user: &UserContext, table: &str, id: i64) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.soft_delete(&mut *tx, user, table, id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn revive(pool: &PgPool, engine: &EntityEngine, user: &UserContext, table: &str, id: i64) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.revive(&mut *tx, user, table, id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_canon(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        id: i64,
        canon: bool,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.set_canon(&mut *tx, user, table, id, canon).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Clone in a transaction: a failure at any step leaves no partial copy. Returns the new id.
    pub async fn clone_resource(pool: &PgPool, engine: &EntityEngine, user: &UserContext, table: &str, id: i64) -> Result<i64, AppError> {
        let fields = ownership_fields(engine, table);
        let mut tx = pool.begin().await?;
        let new_id = engine.clone_resource(&mut *tx, user, table, id, &fields).await?;
        tx.commit().await?;
        Ok(new_id)
    }

    pub async fn list_relations(
        pool: &PgPool,
        engine: &EntityEngine,
        table: &str,
        id: i64,
        relation: &str,
    ) -> Result<Vec<Value>, AppError> {
        let mut conn = pool.acquire().await?;
        engine.list_relations(&mut *conn, table, id, relation).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_relation(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        id: i64,
        relation: &str,
        related_id: i64,
        value: Option<Value>,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.add_relation(&mut *tx, user, table, id, relation, related_id, value).await?;
        tx.commit().await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_relation_value(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        id: i64,
        relation: &str,
        related_id: i64,
        value: Value,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.set_relation_value(&mut *tx, user, table, id, relation, related_id, value).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_relation(
        pool: &PgPool,
        engine: &EntityEngine,
        user: &UserContext,
        table: &str,
        id: i64,
        relation: &str,
        related_id: i64,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        engine.remove_relation(&mut *tx, user, table, id, relation, related_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Ownership fields declared for `table` in the catalog.
fn ownership_fields(engine: &EntityEngine, table: &str) -> Vec<String> {
    engine
        .catalog()
        .table(table)
        .map(|t| t.ownership_fields.clone())
        .unwrap_or_default()
}
