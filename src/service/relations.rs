//! Relation rows (`<table>_has_<relation>`): list, add, change the value, remove.

use crate::config::{relation_table, TableInfo};
use crate::error::AppError;
use crate::service::engine::EntityEngine;
use crate::service::ownership::is_blank;
use crate::service::SqlExecutor;
use crate::sql::{delete_relation, insert_relation, select_relations, update_relation_value};
use crate::user::UserContext;
use serde_json::Value;

impl EntityEngine {
    /// The resource table and the join table of one of its relation kinds.
    fn relation_tables(&self, table_name: &str, relation: &str) -> Result<(&TableInfo, &TableInfo), AppError> {
        let table = self.catalog().resource(table_name)?;
        if !table.shape.relations.iter().any(|r| r == relation) {
            return Err(AppError::NotFound(format!("relation {} of {}", relation, table.name)));
        }
        let join = self.join_table(&relation_table(&table.name, relation))?;
        Ok((table, join))
    }

    pub async fn list_relations<E>(&self, db: &mut E, table_name: &str, id: i64, relation: &str) -> Result<Vec<Value>, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let (table, join) = self.relation_tables(table_name, relation)?;
        db.fetch_all(&select_relations(join, &table.name, id)).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_relation<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table_name: &str,
        id: i64,
        relation: &str,
        related_id: i64,
        value: Option<Value>,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        user.require_id()?;
        let (table, join) = self.relation_tables(table_name, relation)?;
        let value = value.filter(|v| !is_blank(v));
        if value.is_some() && !join.has_column("value") {
            return Err(AppError::BadRequest(format!("{} has no value column", join.name)));
        }
        self.authorize_mutation(db, user, table, id).await?;
        db.execute(&insert_relation(join, &table.name, relation, id, related_id, value)).await?;
        tracing::info!(table = %table.name, id, relation, related_id, "relation added");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_relation_value<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table_name: &str,
        id: i64,
        relation: &str,
        related_id: i64,
        value: Value,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        user.require_id()?;
        let (table, join) = self.relation_tables(table_name, relation)?;
        if !join.has_column("value") {
            return Err(AppError::BadRequest(format!("{} has no value column", join.name)));
        }
        self.authorize_mutation(db, user, table, id).await?;
        let q = update_relation_value(join, &table.name, relation, id, related_id, value);
        if db.execute(&q).await? == 0 {
            return Err(AppError::NotFound(format!("{} {} {}", join.name, id, related_id)));
        }
        Ok(())
    }

    pub async fn remove_relation<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table_name: &str,
        id: i64,
        relation: &str,
        related_id: i64,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        user.require_id()?;
        let (table, join) = self.relation_tables(table_name, relation)?;
        self.authorize_mutation(db, user, table, id).await?;
        if db.execute(&delete_relation(join, &table.name, relation, id, related_id)).await? == 0 {
            return Err(AppError::NotFound(format!("{} {} {}", join.name, id, related_id)));
        }
        tracing::info!(table = %table.name, id, relation, related_id, "relation removed");
        Ok(())
    }
}
