//! Resolved catalog: every known table with its columns and its precomputed convention shape.

use crate::error::AppError;
use std::collections::HashMap;

/// Prefix of ownership join tables: `user_has_<table>`.
pub const OWNERSHIP_PREFIX: &str = "user_has_";
/// Combination dimension reserved for the clone provenance marker.
pub const COPY_DIMENSION: &str = "copy";
/// Relation kind reserved for comments (handled outside the engine).
pub const COMMENT_RELATION: &str = "comment";

/// Columns no caller may write through generic create/update/clone.
pub const RESERVED_COLUMNS: &[&str] = &["id", "user_id", "canon", "created", "deleted", "updated"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name used as a cast on bound parameters (e.g. "int4", "timestamptz").
    pub pg_type: Option<String>,
}

/// What the table-name conventions say about one table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableShape {
    /// A `user_has_<table>` ownership join exists.
    pub user_owned: bool,
    /// Dimensions `X` of every `<table>_is_X` join, except `copy`, in catalog order.
    pub combinations: Vec<String>,
    /// Kinds `X` of every `<table>_has_X` join, except `comment`, in catalog order.
    pub relations: Vec<String>,
}

impl TableShape {
    /// Scan `names` for the joins that belong to `table`. Pure; result order follows `names`.
    pub fn classify<S: AsRef<str>>(names: &[S], table: &str) -> TableShape {
        let owner_table = ownership_table(table);
        let is_prefix = format!("{}_is_", table);
        let has_prefix = format!("{}_has_", table);
        let mut shape = TableShape::default();
        for name in names {
            let name = name.as_ref();
            if name == owner_table {
                shape.user_owned = true;
            }
            if let Some(dim) = name.strip_prefix(&is_prefix) {
                if !dim.is_empty() && dim != COPY_DIMENSION {
                    shape.combinations.push(dim.to_string());
                }
            }
            if let Some(rel) = name.strip_prefix(&has_prefix) {
                if !rel.is_empty() && rel != COMMENT_RELATION {
                    shape.relations.push(rel.to_string());
                }
            }
        }
        shape
    }

    /// Admin-managed tables have no per-instance ownership.
    pub fn admin_managed(&self) -> bool {
        !self.user_owned
    }

    /// Body field names (`<dimension>_id`) diverted to the combination step.
    pub fn combination_fields(&self) -> Vec<String> {
        self.combinations.iter().map(|d| foreign_key(d)).collect()
    }
}

#[derive(Clone, Debug)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub shape: TableShape,
    /// Referenced resources the acting user must own when supplying `<name>_id`.
    pub ownership_fields: Vec<String>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Resource tables carry a generated `id`; join tables do not.
    pub fn is_resource(&self) -> bool {
        self.has_column("id")
    }

    /// Columns a clone copies verbatim: everything but reserved columns and combination keys.
    pub fn copyable_columns(&self) -> Vec<&ColumnInfo> {
        let combination_fields = self.shape.combination_fields();
        self.columns
            .iter()
            .filter(|c| !RESERVED_COLUMNS.contains(&c.name.as_str()))
            .filter(|c| !combination_fields.contains(&c.name))
            .collect()
    }
}

/// Immutable snapshot of every table known to the process, in catalog order.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<TableInfo>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build the snapshot and precompute each table's shape.
    pub fn new(tables: Vec<(String, Vec<ColumnInfo>)>) -> Catalog {
        let names: Vec<&str> = tables.iter().map(|(n, _)| n.as_str()).collect();
        let shapes: Vec<TableShape> = names.iter().map(|n| TableShape::classify(&names, n)).collect();
        let tables: Vec<TableInfo> = tables
            .into_iter()
            .zip(shapes)
            .map(|((name, columns), shape)| TableInfo {
                name,
                columns,
                shape,
                ownership_fields: Vec::new(),
            })
            .collect();
        let index = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Catalog { tables, index }
    }

    pub fn with_ownership_fields(mut self, table: &str, fields: Vec<String>) -> Catalog {
        if let Some(&i) = self.index.get(table) {
            self.tables[i].ownership_fields = fields;
        }
        self
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    /// Resource table by name; join tables and unknown names are not addressable.
    pub fn resource(&self, name: &str) -> Result<&TableInfo, AppError> {
        self.table(name)
            .filter(|t| t.is_resource())
            .ok_or_else(|| AppError::NotFound(format!("resource type {}", name)))
    }

    /// Shape of `table`; unknown tables have the empty (admin-managed) shape.
    pub fn resolve(&self, table: &str) -> TableShape {
        self.table(table).map(|t| t.shape.clone()).unwrap_or_default()
    }
}

pub fn ownership_table(table: &str) -> String {
    format!("{}{}", OWNERSHIP_PREFIX, table)
}

pub fn combination_table(table: &str, dimension: &str) -> String {
    format!("{}_is_{}", table, dimension)
}

pub fn relation_table(table: &str, relation: &str) -> String {
    format!("{}_has_{}", table, relation)
}

/// `<name>_id`, the foreign-key column convention.
pub fn foreign_key(name: &str) -> String {
    format!("{}_id", name)
}
