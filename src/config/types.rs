//! Raw catalog manifest types (JSON), used when the schema is declared rather than introspected.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnManifest {
    pub name: String,
    /// PostgreSQL type name (udt name such as `int4`, `text`, `timestamptz`).
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableManifest {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnManifest>,
    /// Names `x` whose `x_id` body field must reference a row the acting user owns.
    #[serde(default)]
    pub ownership_fields: Vec<String>,
}

/// Every table in catalog order. Order matters: shape lists follow it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub tables: Vec<TableManifest>,
}
