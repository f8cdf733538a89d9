//! Manifest validation: identifiers, uniqueness, and join-table convention columns.

use crate::config::resolved::{combination_table, foreign_key, ownership_table, relation_table, TableShape, COPY_DIMENSION};
use crate::config::CatalogManifest;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static identifier pattern"))
}

/// True when `s` may be spliced into SQL as an identifier.
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

pub fn validate(manifest: &CatalogManifest) -> Result<(), ConfigError> {
    let mut table_names = HashSet::new();
    for t in &manifest.tables {
        if !is_identifier(&t.name) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "table",
                name: t.name.clone(),
            });
        }
        if !table_names.insert(t.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "table",
                name: t.name.clone(),
            });
        }
        let mut column_names = HashSet::new();
        for c in &t.columns {
            if !is_identifier(&c.name) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "column",
                    name: format!("{}.{}", t.name, c.name),
                });
            }
            if !column_names.insert(c.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "column",
                    name: format!("{}.{}", t.name, c.name),
                });
            }
        }
    }

    let columns: HashMap<&str, HashSet<&str>> = manifest
        .tables
        .iter()
        .map(|t| (t.name.as_str(), t.columns.iter().map(|c| c.name.as_str()).collect()))
        .collect();
    let names: Vec<&str> = manifest.tables.iter().map(|t| t.name.as_str()).collect();
    for t in &manifest.tables {
        for field in &t.ownership_fields {
            if !columns.contains_key(ownership_table(field).as_str()) {
                return Err(ConfigError::UnknownOwnershipField {
                    table: t.name.clone(),
                    field: field.clone(),
                });
            }
        }
    }
    for table in &names {
        let shape = TableShape::classify(&names, table);
        let own_key = foreign_key(table);
        if shape.user_owned {
            require_columns(&columns, &ownership_table(table), &["user_id", own_key.as_str(), "owner"])?;
        }
        for dim in &shape.combinations {
            require_columns(&columns, &combination_table(table, dim), &[own_key.as_str(), foreign_key(dim).as_str()])?;
        }
        for rel in &shape.relations {
            require_columns(&columns, &relation_table(table, rel), &[own_key.as_str(), foreign_key(rel).as_str()])?;
        }
        let copy = combination_table(table, COPY_DIMENSION);
        if columns.contains_key(copy.as_str()) {
            require_columns(&columns, &copy, &[own_key.as_str(), foreign_key(COPY_DIMENSION).as_str()])?;
        }
    }
    Ok(())
}

fn require_columns(
    columns: &HashMap<&str, HashSet<&str>>,
    table: &str,
    required: &[&str],
) -> Result<(), ConfigError> {
    let present = columns.get(table);
    for col in required {
        if !present.map(|p| p.contains(col)).unwrap_or(false) {
            return Err(ConfigError::MissingJoinColumn {
                table: table.to_string(),
                column: col.to_string(),
            });
        }
    }
    Ok(())
}
