//! Build the catalog from a JSON manifest or by introspecting the database schema.

use crate::config::resolved::{Catalog, ColumnInfo};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use sqlx::PgPool;
use std::path::Path;

/// Build the catalog snapshot from a manifest (call once at startup).
pub fn resolve(manifest: &CatalogManifest) -> Result<Catalog, ConfigError> {
    validate(manifest)?;
    let tables = manifest
        .tables
        .iter()
        .map(|t| {
            let columns = t
                .columns
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    pg_type: c.type_.clone(),
                })
                .collect();
            (t.name.clone(), columns)
        })
        .collect();
    let catalog = manifest
        .tables
        .iter()
        .filter(|t| !t.ownership_fields.is_empty())
        .fold(Catalog::new(tables), |catalog, t| {
            catalog.with_ownership_fields(&t.name, t.ownership_fields.clone())
        });
    tracing::info!(tables = catalog.tables().len(), "catalog resolved");
    Ok(catalog)
}

/// Add ownership fields from settings to the manifest's tables (introspected catalogs have none).
pub fn apply_ownership_fields(
    manifest: &mut CatalogManifest,
    overlay: &[(String, Vec<String>)],
) -> Result<(), ConfigError> {
    for (table, fields) in overlay {
        let entry = manifest
            .tables
            .iter_mut()
            .find(|t| &t.name == table)
            .ok_or_else(|| ConfigError::Load(format!("ownership fields given for unknown table {}", table)))?;
        for field in fields {
            if !entry.ownership_fields.contains(field) {
                entry.ownership_fields.push(field.clone());
            }
        }
    }
    Ok(())
}

/// Read a manifest from a JSON file.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<CatalogManifest, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Introspect every base table of `schema` (ordered by table name, then column position).
pub async fn load_from_pool(pool: &PgPool, schema: &str) -> Result<CatalogManifest, ConfigError> {
    let sql = "SELECT c.table_name::text, c.column_name::text, c.udt_name::text \
               FROM information_schema.columns c \
               JOIN information_schema.tables t \
                 ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
               WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE' \
               ORDER BY c.table_name, c.ordinal_position";
    tracing::debug!(sql = %sql, schema = %schema, "query");
    let rows = sqlx::query_as::<_, (String, String, Option<String>)>(sql)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    Ok(manifest_from_rows(rows))
}

fn manifest_from_rows(rows: Vec<(String, String, Option<String>)>) -> CatalogManifest {
    let mut tables: Vec<TableManifest> = Vec::new();
    for (table, column, udt) in rows {
        let column = ColumnManifest { name: column, type_: udt };
        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(column),
            _ => tables.push(TableManifest {
                name: table,
                columns: vec![column],
                ownership_fields: Vec::new(),
            }),
        }
    }
    CatalogManifest { tables }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_introspected_rows_in_order() {
        let row = |t: &str, c: &str, u: &str| (t.to_string(), c.to_string(), Some(u.to_string()));
        let manifest = manifest_from_rows(vec![
            row("user_has_weapon", "user_id", "int4"),
            row("user_has_weapon", "weapon_id", "int4"),
            row("weapon", "id", "int4"),
            row("weapon", "name", "varchar"),
        ]);
        assert_eq!(manifest.tables.len(), 2);
        assert_eq!(manifest.tables[0].name, "user_has_weapon");
        assert_eq!(manifest.tables[1].columns[1].name, "name");
        assert_eq!(manifest.tables[1].columns[1].type_.as_deref(), Some("varchar"));
    }

    #[test]
    fn resolves_manifest_json() {
        let manifest: CatalogManifest = serde_json::from_value(serde_json::json!({
            "tables": [
                { "name": "weapon", "columns": [ { "name": "id", "type": "int4" }, { "name": "name" } ],
                  "ownership_fields": ["weapon"] },
                { "name": "user_has_weapon", "columns": [
                    { "name": "user_id" }, { "name": "weapon_id" }, { "name": "owner" } ] }
            ]
        }))
        .unwrap();
        let catalog = resolve(&manifest).unwrap();
        let weapon = catalog.resource("weapon").unwrap();
        assert!(weapon.shape.user_owned);
        assert_eq!(weapon.column("id").unwrap().pg_type.as_deref(), Some("int4"));
        assert_eq!(weapon.ownership_fields, vec!["weapon".to_string()]);
    }

    #[test]
    fn ownership_overlay_reaches_introspected_catalog() {
        let row = |t: &str, c: &str| (t.to_string(), c.to_string(), None);
        let mut manifest = manifest_from_rows(vec![
            row("asset", "id"),
            row("user_has_asset", "user_id"),
            row("user_has_asset", "asset_id"),
            row("user_has_asset", "owner"),
            row("weapon", "id"),
            row("weapon", "asset_id"),
        ]);
        apply_ownership_fields(&mut manifest, &[("weapon".into(), vec!["asset".into()])]).unwrap();
        let catalog = resolve(&manifest).unwrap();
        assert_eq!(catalog.table("weapon").unwrap().ownership_fields, vec!["asset".to_string()]);

        let err = apply_ownership_fields(&mut manifest, &[("armour".into(), vec!["asset".into()])]).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));

        apply_ownership_fields(&mut manifest, &[("weapon".into(), vec!["gem".into()])]).unwrap();
        assert!(matches!(resolve(&manifest), Err(ConfigError::UnknownOwnershipField { .. })));
    }

    #[test]
    fn missing_manifest_file_is_a_load_error() {
        let err = load_manifest("/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
