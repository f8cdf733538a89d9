//! Generic entity engine: create, update, soft delete, clone, revive and canon for any
//! resource table, driven by the table-name conventions recorded in the catalog.
//!
//! Every operation takes the executor it should run on. `CrudService` hands it an open
//! transaction, so a failing step leaves nothing behind.

use crate::config::{combination_table, ownership_table, relation_table, Catalog, TableInfo, COPY_DIMENSION, RESERVED_COLUMNS};
use crate::error::AppError;
use crate::service::executor::row_i64;
use crate::service::ownership::{is_blank, parse_id, verify_multiple_ownership, verify_ownership};
use crate::service::SqlExecutor;
use crate::sql::{
    clone_row, copy_relation_rows, delete_combination, insert_combination, insert_ownership, insert_returning_id,
    select_by_id, select_combination, select_id, set_canon, set_deleted, update_by_id,
};
use crate::user::UserContext;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// Names `x` whose `x_id` in the body must reference a row the user owns.
    pub ownership_fields: Vec<String>,
    /// Also set `updated = CURRENT_TIMESTAMP` when columns change.
    pub touch_updated: bool,
}

#[derive(Clone)]
pub struct EntityEngine {
    catalog: Arc<Catalog>,
}

impl EntityEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        EntityEngine { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Insert a new resource owned by `user`; returns its id.
    pub async fn create<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        body: &Map<String, Value>,
        table_name: &str,
        ownership_fields: &[String],
    ) -> Result<i64, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        require_creator(user, table)?;
        verify_multiple_ownership(db, &self.catalog, user, body, ownership_fields).await?;

        let combinations = combination_assignments(table, body)?;
        let mut values = writable_values(table, body);
        if table.has_column("user_id") {
            values.insert(0, ("user_id".to_string(), Value::from(user_id)));
        }
        let row = db
            .fetch_optional(&insert_returning_id(table, &values))
            .await?
            .ok_or_else(|| no_returned_id(table))?;
        let id = row_i64(&row, "id").ok_or_else(|| no_returned_id(table))?;

        for (dimension, foreign_id) in &combinations {
            self.assign_combination(db, table, dimension, id, *foreign_id, false).await?;
        }
        if table.shape.user_owned {
            self.grant_ownership(db, table, user_id, id).await?;
        }
        tracing::info!(table = %table.name, id, user_id, "created");
        Ok(id)
    }

    /// Change columns and combination assignments of an existing resource.
    pub async fn update<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        body: &Map<String, Value>,
        table_name: &str,
        id: i64,
        options: &UpdateOptions,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        self.authorize_mutation(db, user, table, id).await?;
        verify_multiple_ownership(db, &self.catalog, user, body, &options.ownership_fields).await?;

        let combinations = combination_assignments(table, body)?;
        let values = writable_values(table, body);
        match update_by_id(table, id, &values, options.touch_updated && table.has_column("updated")) {
            Some(q) => {
                if db.execute(&q).await? == 0 {
                    return Err(not_found(table, id));
                }
            }
            None if !combinations.is_empty() => self.ensure_exists(db, table, id).await?,
            None => {}
        }
        for (dimension, foreign_id) in &combinations {
            self.assign_combination(db, table, dimension, id, *foreign_id, true).await?;
        }
        tracing::info!(table = %table.name, id, user_id, columns = values.len(), "updated");
        Ok(())
    }

    /// Stamp `deleted`. Deleting twice re-stamps and succeeds.
    pub async fn soft_delete<E>(&self, db: &mut E, user: &UserContext, table_name: &str, id: i64) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        require_column(table, "deleted")?;
        self.authorize_mutation(db, user, table, id).await?;
        if db.execute(&set_deleted(table, id, true)).await? == 0 {
            return Err(not_found(table, id));
        }
        tracing::info!(table = %table.name, id, user_id, "soft deleted");
        Ok(())
    }

    /// Clear `deleted`. Administrators only.
    pub async fn revive<E>(&self, db: &mut E, user: &UserContext, table_name: &str, id: i64) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        require_column(table, "deleted")?;
        if !user.admin {
            return Err(AppError::not_admin());
        }
        if db.execute(&set_deleted(table, id, false)).await? == 0 {
            return Err(not_found(table, id));
        }
        tracing::info!(table = %table.name, id, user_id, "revived");
        Ok(())
    }

    /// Set or clear the canon flag. Administrators only.
    pub async fn set_canon<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table_name: &str,
        id: i64,
        canon: bool,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        require_column(table, "canon")?;
        if !user.admin {
            return Err(AppError::not_admin());
        }
        if db.execute(&set_canon(table, id, canon)).await? == 0 {
            return Err(not_found(table, id));
        }
        tracing::info!(table = %table.name, id, user_id, canon, "canon set");
        Ok(())
    }

    /// Duplicate a resource with its relation rows and combination assignments; the copy is
    /// owned by `user` and points back to `id` through the `copy` combination.
    pub async fn clone_resource<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table_name: &str,
        id: i64,
        ownership_fields: &[String],
    ) -> Result<i64, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let user_id = user.require_id()?;
        let table = self.catalog.resource(table_name)?;
        require_creator(user, table)?;

        let source = db
            .fetch_optional(&select_by_id(table, id))
            .await?
            .ok_or_else(|| not_found(table, id))?;
        let mut source = match source {
            Value::Object(m) => m,
            _ => Map::new(),
        };

        let mut staged = Vec::with_capacity(table.shape.combinations.len());
        for dimension in &table.shape.combinations {
            let join = self.join_table(&combination_table(&table.name, dimension))?;
            let field = crate::config::foreign_key(dimension);
            let current = db.fetch_optional(&select_combination(join, &table.name, dimension, id)).await?;
            if let Some(foreign_id) = current.as_ref().and_then(|row| row_i64(row, &field)) {
                source.insert(field, Value::from(foreign_id));
                staged.push((dimension.clone(), foreign_id));
            }
        }
        verify_multiple_ownership(db, &self.catalog, user, &source, ownership_fields).await?;

        let owner = table.has_column("user_id").then_some(user_id);
        let row = db
            .fetch_optional(&clone_row(table, &table.copyable_columns(), owner, id))
            .await?
            .ok_or_else(|| not_found(table, id))?;
        let new_id = row_i64(&row, "id").ok_or_else(|| no_returned_id(table))?;

        for relation in &table.shape.relations {
            let join = self.join_table(&relation_table(&table.name, relation))?;
            let copied = db.execute(&copy_relation_rows(join, &table.name, id, new_id)).await?;
            tracing::debug!(table = %table.name, relation = %relation, copied, "relation rows copied");
        }
        for (dimension, foreign_id) in &staged {
            self.assign_combination(db, table, dimension, new_id, *foreign_id, false).await?;
        }
        match self.catalog.table(&combination_table(&table.name, COPY_DIMENSION)) {
            Some(_) => {
                self.assign_combination(db, table, COPY_DIMENSION, new_id, id, false).await?;
            }
            None => tracing::warn!(table = %table.name, "no copy table; clone provenance not recorded"),
        }
        if table.shape.user_owned {
            self.grant_ownership(db, table, user_id, new_id).await?;
        }
        tracing::info!(table = %table.name, source = id, id = new_id, user_id, "cloned");
        Ok(new_id)
    }

    /// Whether `user` holds an ownership row for `id`. Anonymous users and admin-managed
    /// tables answer false; database failures still propagate.
    pub async fn is_owner<E>(&self, db: &mut E, user: &UserContext, table_name: &str, id: i64) -> Result<bool, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.catalog.resource(table_name)?;
        match verify_ownership(db, &self.catalog, user, &table.name, id).await {
            Ok(()) => Ok(true),
            Err(AppError::Forbidden(_) | AppError::Unauthenticated) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Owners may mutate user-owned rows; administrators may mutate admin-managed rows.
    pub(crate) async fn authorize_mutation<E>(
        &self,
        db: &mut E,
        user: &UserContext,
        table: &TableInfo,
        id: i64,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        if table.shape.user_owned {
            verify_ownership(db, &self.catalog, user, &table.name, id).await
        } else if user.admin {
            Ok(())
        } else {
            Err(AppError::not_admin())
        }
    }

    pub(crate) fn join_table(&self, name: &str) -> Result<&TableInfo, AppError> {
        self.catalog
            .table(name)
            .ok_or_else(|| AppError::NotFound(format!("join table {}", name)))
    }

    async fn ensure_exists<E>(&self, db: &mut E, table: &TableInfo, id: i64) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        match db.fetch_optional(&select_id(table, id)).await? {
            Some(_) => Ok(()),
            None => Err(not_found(table, id)),
        }
    }

    /// Write one combination assignment; `replace` drops any existing one first.
    async fn assign_combination<E>(
        &self,
        db: &mut E,
        table: &TableInfo,
        dimension: &str,
        id: i64,
        foreign_id: i64,
        replace: bool,
    ) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let join = self.join_table(&combination_table(&table.name, dimension))?;
        if replace {
            db.execute(&delete_combination(join, &table.name, id)).await?;
        }
        db.execute(&insert_combination(join, &table.name, dimension, id, foreign_id)).await?;
        Ok(())
    }

    async fn grant_ownership<E>(&self, db: &mut E, table: &TableInfo, user_id: i64, id: i64) -> Result<(), AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let owner_table = self.join_table(&ownership_table(&table.name))?;
        db.execute(&insert_ownership(owner_table, &table.name, user_id, id)).await?;
        Ok(())
    }
}

/// Admin-managed resources can only be created (or cloned) by administrators.
fn require_creator(user: &UserContext, table: &TableInfo) -> Result<(), AppError> {
    if table.shape.admin_managed() && !user.admin {
        return Err(AppError::not_admin());
    }
    Ok(())
}

fn require_column(table: &TableInfo, column: &str) -> Result<(), AppError> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("{} has no {} column", table.name, column)))
    }
}

fn not_found(table: &TableInfo, id: i64) -> AppError {
    AppError::NotFound(format!("{} {}", table.name, id))
}

fn no_returned_id(table: &TableInfo) -> AppError {
    AppError::Internal(format!("insert into {} returned no id", table.name))
}

/// Body values for known, non-reserved, non-combination columns, in column order.
/// Blank values are dropped; unknown keys are ignored.
pub(crate) fn writable_values(table: &TableInfo, body: &Map<String, Value>) -> Vec<(String, Value)> {
    let combination_fields = table.shape.combination_fields();
    for key in body.keys() {
        if !table.has_column(key) && !combination_fields.contains(key) {
            tracing::debug!(table = %table.name, key = %key, "ignoring unknown body key");
        }
    }
    table
        .columns
        .iter()
        .filter(|c| !RESERVED_COLUMNS.contains(&c.name.as_str()))
        .filter(|c| !combination_fields.contains(&c.name))
        .filter_map(|c| {
            let v = body.get(&c.name)?;
            (!is_blank(v)).then(|| (c.name.clone(), v.clone()))
        })
        .collect()
}

/// `(dimension, foreign id)` for every combination field supplied in the body.
pub(crate) fn combination_assignments(table: &TableInfo, body: &Map<String, Value>) -> Result<Vec<(String, i64)>, AppError> {
    let mut out = Vec::new();
    for dimension in &table.shape.combinations {
        let field = crate::config::foreign_key(dimension);
        match body.get(&field) {
            Some(v) if !is_blank(v) => out.push((dimension.clone(), parse_id(&field, v)?)),
            _ => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{catalog, Reply, RecordingExecutor};
    use serde_json::json;

    fn engine() -> EntityEngine {
        EntityEngine::new(Arc::new(catalog()))
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn owns_weapon() -> RecordingExecutor {
        RecordingExecutor::new().on("FROM \"user_has_weapon\"", Reply::rows(vec![json!({"present": 1})]))
    }

    #[tokio::test]
    async fn create_weapon_writes_base_combination_and_ownership_rows() {
        let mut db = RecordingExecutor::new();
        let user = UserContext::new(7, false);
        let id = engine()
            .create(&mut db, &user, &body(json!({"name": "Blade", "species_id": 4})), "weapon", &[])
            .await
            .unwrap();
        assert_eq!(id, 100);
        assert_eq!(
            db.sql(),
            vec![
                "INSERT INTO \"weapon\" (\"user_id\", \"name\") VALUES ($1, $2) RETURNING \"id\"",
                "INSERT INTO \"weapon_is_species\" (\"weapon_id\", \"species_id\") VALUES ($1, $2)",
                "INSERT INTO \"user_has_weapon\" (\"user_id\", \"weapon_id\", \"owner\") VALUES ($1, $2, $3)",
            ]
        );
        assert_eq!(db.statements[0].params, vec![json!(7), json!("Blade")]);
        assert_eq!(db.statements[1].params, vec![json!(100), json!(4)]);
        assert_eq!(db.statements[2].params, vec![json!(7), json!(100), json!(true)]);
    }

    #[tokio::test]
    async fn create_ignores_reserved_blank_and_unknown_fields() {
        let mut db = RecordingExecutor::new();
        let user = UserContext::new(7, false);
        let b = body(json!({
            "id": 55, "user_id": 1, "canon": true, "created": "x", "updated": "x", "deleted": "x",
            "name": "Blade", "description": "", "bogus": 1, "species_id": ""
        }));
        engine().create(&mut db, &user, &b, "weapon", &[]).await.unwrap();
        assert_eq!(db.statements.len(), 2);
        assert_eq!(db.statements[0].params, vec![json!(7), json!("Blade")]);
        assert!(db.statements[1].sql.starts_with("INSERT INTO \"user_has_weapon\""));
    }

    #[tokio::test]
    async fn create_on_admin_managed_table_requires_admin() {
        let mut db = RecordingExecutor::new();
        let err = engine()
            .create(&mut db, &UserContext::new(7, false), &body(json!({"name": "Elf"})), "species", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(db.statements.is_empty());

        let id = engine()
            .create(&mut db, &UserContext::new(1, true), &body(json!({"name": "Elf"})), "species", &[])
            .await
            .unwrap();
        assert_eq!(id, 100);
        assert_eq!(db.statements.len(), 1);
    }

    #[tokio::test]
    async fn create_requires_authentication_and_known_table() {
        let mut db = RecordingExecutor::new();
        let err = engine()
            .create(&mut db, &UserContext::anonymous(), &Map::new(), "weapon", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
        let err = engine()
            .create(&mut db, &UserContext::new(7, true), &Map::new(), "weapon_is_species", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(db.statements.is_empty());
    }

    #[tokio::test]
    async fn create_checks_embedded_ownership_before_writing() {
        let mut db = RecordingExecutor::new();
        let fields = vec!["asset".to_string()];
        let err = engine()
            .create(&mut db, &UserContext::new(7, false), &body(json!({"name": "Blade", "asset_id": 12})), "weapon", &fields)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(db.sql().iter().all(|s| s.starts_with("SELECT")));
    }

    #[tokio::test]
    async fn update_by_non_owner_is_forbidden_and_writes_nothing() {
        let mut db = RecordingExecutor::new();
        let err = engine()
            .update(&mut db, &UserContext::new(8, true), &body(json!({"name": "Axe"})), "weapon", 3, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(db.statements.len(), 1);
        assert!(db.statements[0].sql.starts_with("SELECT 1"));
    }

    #[tokio::test]
    async fn update_with_only_blank_or_reserved_fields_is_a_no_op() {
        let mut db = owns_weapon();
        let options = UpdateOptions {
            touch_updated: true,
            ..Default::default()
        };
        engine()
            .update(&mut db, &UserContext::new(7, false), &body(json!({"id": 9, "canon": true, "name": ""})), "weapon", 3, &options)
            .await
            .unwrap();
        assert_eq!(db.statements.len(), 1);
    }

    #[tokio::test]
    async fn update_sets_columns_and_replaces_combination() {
        let mut db = owns_weapon();
        let options = UpdateOptions {
            touch_updated: true,
            ..Default::default()
        };
        engine()
            .update(&mut db, &UserContext::new(7, false), &body(json!({"name": "Axe", "species_id": "5"})), "weapon", 3, &options)
            .await
            .unwrap();
        assert_eq!(
            &db.sql()[1..],
            &[
                "UPDATE \"weapon\" SET \"name\" = $1, \"updated\" = CURRENT_TIMESTAMP WHERE \"id\" = $2",
                "DELETE FROM \"weapon_is_species\" WHERE \"weapon_id\" = $1",
                "INSERT INTO \"weapon_is_species\" (\"weapon_id\", \"species_id\") VALUES ($1, $2)",
            ]
        );
        assert_eq!(db.statements[3].params, vec![json!(3), json!(5)]);
    }

    #[tokio::test]
    async fn update_of_missing_admin_managed_row_is_not_found() {
        let mut db = RecordingExecutor::new().on("UPDATE \"species\"", Reply::affected(0));
        let err = engine()
            .update(&mut db, &UserContext::new(1, true), &body(json!({"name": "Orc"})), "species", 42, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut db = RecordingExecutor::new();
        let err = engine()
            .update(&mut db, &UserContext::new(7, false), &body(json!({"name": "Orc"})), "species", 42, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn update_of_combination_only_on_missing_row_is_not_found() {
        let mut db = RecordingExecutor::new();
        let err = engine()
            .update(&mut db, &UserContext::new(1, true), &body(json!({"species_id": 5})), "weapon", 42, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut db = owns_weapon();
        let err = engine()
            .update(&mut db, &UserContext::new(7, false), &body(json!({"species_id": 5})), "weapon", 42, &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(db.sql()[1], "SELECT \"id\" FROM \"weapon\" WHERE \"id\" = $1");
        assert!(db.sql().iter().all(|s| !s.contains("weapon_is_species")));
    }

    #[tokio::test]
    async fn create_without_returned_id_is_an_internal_error() {
        let mut db = RecordingExecutor::new().on("INSERT INTO \"weapon\"", Reply::rows(Vec::new()));
        let err = engine()
            .create(&mut db, &UserContext::new(7, false), &body(json!({"name": "Blade"})), "weapon", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.status_and_code().0, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn ownership_query_answers_instead_of_failing() {
        let user = UserContext::new(7, false);
        let mut db = owns_weapon();
        assert!(engine().is_owner(&mut db, &user, "weapon", 3).await.unwrap());

        let mut db = RecordingExecutor::new();
        assert!(!engine().is_owner(&mut db, &user, "weapon", 3).await.unwrap());
        assert!(!engine().is_owner(&mut db, &UserContext::anonymous(), "weapon", 3).await.unwrap());
        assert!(!engine().is_owner(&mut db, &UserContext::new(1, true), "species", 3).await.unwrap());

        let mut db = RecordingExecutor::new().on("FROM \"user_has_weapon\"", Reply::fail("connection reset"));
        assert!(matches!(engine().is_owner(&mut db, &user, "weapon", 3).await, Err(AppError::Db(_))));
        assert!(matches!(engine().is_owner(&mut db, &user, "armour", 3).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn soft_delete_stamps_and_is_repeatable() {
        let mut db = owns_weapon();
        let user = UserContext::new(7, false);
        engine().soft_delete(&mut db, &user, "weapon", 3).await.unwrap();
        engine().soft_delete(&mut db, &user, "weapon", 3).await.unwrap();
        let stamps: Vec<&str> = db.sql().into_iter().filter(|s| s.starts_with("UPDATE")).collect();
        assert_eq!(stamps, vec!["UPDATE \"weapon\" SET \"deleted\" = CURRENT_TIMESTAMP WHERE \"id\" = $1"; 2]);
    }

    #[tokio::test]
    async fn soft_delete_by_stranger_or_non_admin_is_forbidden() {
        let mut db = RecordingExecutor::new();
        let err = engine().soft_delete(&mut db, &UserContext::new(8, false), "weapon", 3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(db.sql().iter().all(|s| !s.starts_with("UPDATE")));

        let mut db = RecordingExecutor::new();
        let err = engine().soft_delete(&mut db, &UserContext::new(7, false), "species", 42).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(db.statements.is_empty());
    }

    #[tokio::test]
    async fn soft_delete_of_missing_row_is_not_found() {
        let mut db = RecordingExecutor::new().on("UPDATE \"species\"", Reply::affected(0));
        let err = engine().soft_delete(&mut db, &UserContext::new(1, true), "species", 42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn revive_and_canon_are_admin_only() {
        let mut db = RecordingExecutor::new();
        let user = UserContext::new(7, false);
        assert!(matches!(engine().revive(&mut db, &user, "weapon", 3).await, Err(AppError::Forbidden(_))));
        assert!(matches!(engine().set_canon(&mut db, &user, "weapon", 3, true).await, Err(AppError::Forbidden(_))));
        assert!(db.statements.is_empty());

        let admin = UserContext::new(1, true);
        engine().revive(&mut db, &admin, "weapon", 3).await.unwrap();
        engine().set_canon(&mut db, &admin, "weapon", 3, true).await.unwrap();
        assert_eq!(
            db.sql(),
            vec![
                "UPDATE \"weapon\" SET \"deleted\" = NULL WHERE \"id\" = $1",
                "UPDATE \"weapon\" SET \"canon\" = $1, \"updated\" = CURRENT_TIMESTAMP WHERE \"id\" = $2",
            ]
        );
        assert!(matches!(
            engine().set_canon(&mut db, &admin, "asset", 3, true).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn clone_copies_row_relations_combinations_and_marks_provenance() {
        let mut db = RecordingExecutor::new()
            .on("SELECT \"id\", \"user_id\"", Reply::rows(vec![json!({"id": 3, "user_id": 2, "name": "Blade", "asset_id": null})]))
            .on("SELECT \"species_id\" FROM \"weapon_is_species\"", Reply::rows(vec![json!({"species_id": 4})]));
        let user = UserContext::new(7, false);
        let new_id = engine().clone_resource(&mut db, &user, "weapon", 3, &[]).await.unwrap();
        assert_eq!(new_id, 100);
        assert_ne!(new_id, 3);
        assert_eq!(
            &db.sql()[2..],
            &[
                "INSERT INTO \"weapon\" (\"user_id\", \"name\", \"description\", \"asset_id\") \
                 SELECT $1, \"name\", \"description\", \"asset_id\" FROM \"weapon\" WHERE \"id\" = $2 RETURNING \"id\"",
                "INSERT INTO \"weapon_has_skill\" (\"weapon_id\", \"skill_id\", \"value\") \
                 SELECT $1, \"skill_id\", \"value\" FROM \"weapon_has_skill\" WHERE \"weapon_id\" = $2",
                "INSERT INTO \"weapon_is_species\" (\"weapon_id\", \"species_id\") VALUES ($1, $2)",
                "INSERT INTO \"weapon_is_copy\" (\"weapon_id\", \"copy_id\") VALUES ($1, $2)",
                "INSERT INTO \"user_has_weapon\" (\"user_id\", \"weapon_id\", \"owner\") VALUES ($1, $2, $3)",
            ]
        );
        assert_eq!(db.statements[2].params, vec![json!(7), json!(3)]);
        assert_eq!(db.statements[3].params, vec![json!(100), json!(3)]);
        assert_eq!(db.statements[4].params, vec![json!(100), json!(4)]);
        assert_eq!(db.statements[5].params, vec![json!(100), json!(3)]);
        assert_eq!(db.statements[6].params, vec![json!(7), json!(100), json!(true)]);
    }

    #[tokio::test]
    async fn clone_of_missing_source_is_not_found() {
        let mut db = RecordingExecutor::new();
        let err = engine().clone_resource(&mut db, &UserContext::new(7, false), "weapon", 3, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(db.statements.len(), 1);
    }

    #[tokio::test]
    async fn clone_verifies_ownership_of_embedded_references() {
        let mut db = RecordingExecutor::new()
            .on("SELECT \"id\", \"user_id\"", Reply::rows(vec![json!({"id": 3, "name": "Blade", "asset_id": 12})]));
        let fields = vec!["asset".to_string()];
        let err = engine().clone_resource(&mut db, &UserContext::new(7, false), "weapon", 3, &fields).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(db.sql().iter().all(|s| !s.starts_with("INSERT")));
    }

    #[tokio::test]
    async fn clone_aborts_on_first_failing_step() {
        let mut db = RecordingExecutor::new()
            .on("SELECT \"id\", \"user_id\"", Reply::rows(vec![json!({"id": 3, "name": "Blade"})]))
            .on("INSERT INTO \"weapon_has_skill\"", Reply::fail("constraint violation"));
        let err = engine().clone_resource(&mut db, &UserContext::new(7, false), "weapon", 3, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Db(_)));
        assert!(db.sql().last().unwrap().starts_with("INSERT INTO \"weapon_has_skill\""));
    }

    #[test]
    fn writable_values_follow_column_order() {
        let catalog = catalog();
        let weapon = catalog.table("weapon").unwrap();
        let values = writable_values(weapon, &body(json!({"description": "sharp", "name": "Blade", "asset_id": null})));
        assert_eq!(
            values,
            vec![("name".to_string(), json!("Blade")), ("description".to_string(), json!("sharp"))]
        );
        assert!(matches!(
            combination_assignments(weapon, &body(json!({"species_id": "elf"}))),
            Err(AppError::BadRequest(_))
        ));
    }
}
