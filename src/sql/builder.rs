//! Builds parameterized statements for the entity engine. Identifiers come from the catalog only;
//! every value is a positional parameter.

use crate::config::{foreign_key, ColumnInfo, TableInfo};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the catalog).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder, cast to the column type when known.
    fn placeholder(&mut self, v: Value, column: Option<&ColumnInfo>) -> String {
        let n = self.push_param(v);
        column
            .and_then(|c| c.pg_type.as_deref())
            .map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n))
    }
}

/// Types sqlx decodes natively into JSON; everything else is selected as text.
const NATIVE_TYPES: &[&str] = &[
    "int2", "int4", "int8", "float4", "float8", "bool", "text", "varchar", "bpchar", "timestamptz",
    "timestamp", "date", "json", "jsonb",
];

fn select_column_list<'a>(columns: impl IntoIterator<Item = &'a ColumnInfo>) -> String {
    columns
        .into_iter()
        .map(|c| {
            let q = quoted(&c.name);
            match c.pg_type.as_deref() {
                Some(t) if !NATIVE_TYPES.contains(&t) => format!("{}::text AS {}", q, q),
                _ => q,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn id_value(id: i64) -> Value {
    Value::Number(id.into())
}

/// SELECT every column of one row by id.
pub fn select_by_id(table: &TableInfo, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id_value(id), table.column("id"));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(&table.columns),
        quoted(&table.name),
        quoted("id"),
        ph
    );
    q
}

/// SELECT the id only; used as an existence probe.
pub fn select_id(table: &TableInfo, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id_value(id), table.column("id"));
    q.sql = format!("SELECT {} FROM {} WHERE {} = {}", quoted("id"), quoted(&table.name), quoted("id"), ph);
    q
}

/// Ordering for list queries: (column, descending).
pub type OrderBy = Vec<(String, bool)>;

/// SELECT list, filtered on `deleted` when the table has that column.
pub fn select_list(
    table: &TableInfo,
    deleted: bool,
    order_by: &[(String, bool)],
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = if table.has_column("deleted") {
        let cond = if deleted { "IS NOT NULL" } else { "IS NULL" };
        format!(" WHERE {} {}", quoted("deleted"), cond)
    } else {
        String::new()
    };
    let order = if order_by.is_empty() {
        quoted("id")
    } else {
        order_by
            .iter()
            .map(|(col, desc)| format!("{} {}", quoted(col), if *desc { "DESC" } else { "ASC" }))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(1000))).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}{}",
        select_column_list(&table.columns),
        quoted(&table.name),
        where_clause,
        order,
        limit_clause,
        offset_clause
    );
    q
}

/// INSERT one row from (column, value) pairs and return the generated id.
pub fn insert_returning_id(table: &TableInfo, values: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    if values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", quoted(&table.name), quoted("id"));
        return q;
    }
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (name, val) in values {
        placeholders.push(q.placeholder(val.clone(), table.column(name)));
        cols.push(quoted(name));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&table.name),
        cols.join(", "),
        placeholders.join(", "),
        quoted("id")
    );
    q
}

/// UPDATE by id. None when there is nothing to set.
pub fn update_by_id(
    table: &TableInfo,
    id: i64,
    values: &[(String, Value)],
    touch_updated: bool,
) -> Option<QueryBuf> {
    if values.is_empty() {
        return None;
    }
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(values.len() + 1);
    for (name, val) in values {
        let ph = q.placeholder(val.clone(), table.column(name));
        sets.push(format!("{} = {}", quoted(name), ph));
    }
    if touch_updated {
        sets.push(format!("{} = CURRENT_TIMESTAMP", quoted("updated")));
    }
    let ph = q.placeholder(id_value(id), table.column("id"));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&table.name),
        sets.join(", "),
        quoted("id"),
        ph
    );
    Some(q)
}

/// Stamp `deleted` (soft delete) or clear it (revive).
pub fn set_deleted(table: &TableInfo, id: i64, deleted: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let value = if deleted { "CURRENT_TIMESTAMP" } else { "NULL" };
    let ph = q.placeholder(id_value(id), table.column("id"));
    q.sql = format!(
        "UPDATE {} SET {} = {} WHERE {} = {}",
        quoted(&table.name),
        quoted("deleted"),
        value,
        quoted("id"),
        ph
    );
    q
}

pub fn set_canon(table: &TableInfo, id: i64, canon: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let canon_ph = q.placeholder(Value::Bool(canon), table.column("canon"));
    let mut sets = vec![format!("{} = {}", quoted("canon"), canon_ph)];
    if table.has_column("updated") {
        sets.push(format!("{} = CURRENT_TIMESTAMP", quoted("updated")));
    }
    let ph = q.placeholder(id_value(id), table.column("id"));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&table.name),
        sets.join(", "),
        quoted("id"),
        ph
    );
    q
}

/// Probe `user_has_<resource>` for the (user, resource id) pair.
pub fn select_ownership(owner_table: &TableInfo, resource: &str, user_id: i64, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let user_ph = q.placeholder(id_value(user_id), owner_table.column("user_id"));
    let id_ph = q.placeholder(id_value(id), owner_table.column(&fk));
    q.sql = format!(
        "SELECT 1 AS {} FROM {} WHERE {} = {} AND {} = {}",
        quoted("present"),
        quoted(&owner_table.name),
        quoted("user_id"),
        user_ph,
        quoted(&fk),
        id_ph
    );
    q
}

pub fn insert_ownership(owner_table: &TableInfo, resource: &str, user_id: i64, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let user_ph = q.placeholder(id_value(user_id), owner_table.column("user_id"));
    let id_ph = q.placeholder(id_value(id), owner_table.column(&fk));
    let owner_ph = q.placeholder(Value::Bool(true), owner_table.column("owner"));
    q.sql = format!(
        "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
        quoted(&owner_table.name),
        quoted("user_id"),
        quoted(&fk),
        quoted("owner"),
        user_ph,
        id_ph,
        owner_ph
    );
    q
}

/// Current assignment of one combination dimension.
pub fn select_combination(join: &TableInfo, resource: &str, dimension: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let ph = q.placeholder(id_value(id), join.column(&fk));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        quoted(&foreign_key(dimension)),
        quoted(&join.name),
        quoted(&fk),
        ph
    );
    q
}

pub fn delete_combination(join: &TableInfo, resource: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let ph = q.placeholder(id_value(id), join.column(&fk));
    q.sql = format!("DELETE FROM {} WHERE {} = {}", quoted(&join.name), quoted(&fk), ph);
    q
}

pub fn insert_combination(join: &TableInfo, resource: &str, dimension: &str, id: i64, foreign_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let dim_fk = foreign_key(dimension);
    let id_ph = q.placeholder(id_value(id), join.column(&fk));
    let dim_ph = q.placeholder(id_value(foreign_id), join.column(&dim_fk));
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        quoted(&join.name),
        quoted(&fk),
        quoted(&dim_fk),
        id_ph,
        dim_ph
    );
    q
}

/// Duplicate one row server-side: copy `columns` verbatim, owner column rewritten to `user_id`.
pub fn clone_row(table: &TableInfo, columns: &[&ColumnInfo], user_id: Option<i64>, source_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut targets = Vec::with_capacity(columns.len() + 1);
    let mut sources = Vec::with_capacity(columns.len() + 1);
    if let Some(uid) = user_id {
        targets.push(quoted("user_id"));
        sources.push(q.placeholder(id_value(uid), table.column("user_id")));
    }
    for c in columns {
        targets.push(quoted(&c.name));
        sources.push(quoted(&c.name));
    }
    let ph = q.placeholder(id_value(source_id), table.column("id"));
    q.sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} WHERE {} = {} RETURNING {}",
        quoted(&table.name),
        targets.join(", "),
        sources.join(", "),
        quoted(&table.name),
        quoted("id"),
        ph,
        quoted("id")
    );
    q
}

/// Copy every relation row of `source_id` to `new_id`, other columns verbatim.
/// A surrogate `id` column on the join table is left to its default.
pub fn copy_relation_rows(join: &TableInfo, resource: &str, source_id: i64, new_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let rest: Vec<String> = join
        .columns
        .iter()
        .filter(|c| c.name != fk && c.name != "id")
        .map(|c| quoted(&c.name))
        .collect();
    let new_ph = q.placeholder(id_value(new_id), join.column(&fk));
    let source_ph = q.placeholder(id_value(source_id), join.column(&fk));
    let mut targets = vec![quoted(&fk)];
    targets.extend(rest.iter().cloned());
    let mut sources = vec![new_ph];
    sources.extend(rest);
    q.sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} WHERE {} = {}",
        quoted(&join.name),
        targets.join(", "),
        sources.join(", "),
        quoted(&join.name),
        quoted(&fk),
        source_ph
    );
    q
}

pub fn select_relations(join: &TableInfo, resource: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let ph = q.placeholder(id_value(id), join.column(&fk));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(&join.columns),
        quoted(&join.name),
        quoted(&fk),
        ph
    );
    q
}

pub fn insert_relation(
    join: &TableInfo,
    resource: &str,
    relation: &str,
    id: i64,
    related_id: i64,
    value: Option<Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let rel_fk = foreign_key(relation);
    let mut cols = vec![quoted(&fk), quoted(&rel_fk)];
    let mut placeholders = vec![
        q.placeholder(id_value(id), join.column(&fk)),
        q.placeholder(id_value(related_id), join.column(&rel_fk)),
    ];
    if let Some(v) = value {
        cols.push(quoted("value"));
        placeholders.push(q.placeholder(v, join.column("value")));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(&join.name),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

pub fn update_relation_value(
    join: &TableInfo,
    resource: &str,
    relation: &str,
    id: i64,
    related_id: i64,
    value: Value,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let rel_fk = foreign_key(relation);
    let value_ph = q.placeholder(value, join.column("value"));
    let id_ph = q.placeholder(id_value(id), join.column(&fk));
    let rel_ph = q.placeholder(id_value(related_id), join.column(&rel_fk));
    q.sql = format!(
        "UPDATE {} SET {} = {} WHERE {} = {} AND {} = {}",
        quoted(&join.name),
        quoted("value"),
        value_ph,
        quoted(&fk),
        id_ph,
        quoted(&rel_fk),
        rel_ph
    );
    q
}

pub fn delete_relation(join: &TableInfo, resource: &str, relation: &str, id: i64, related_id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let fk = foreign_key(resource);
    let rel_fk = foreign_key(relation);
    let id_ph = q.placeholder(id_value(id), join.column(&fk));
    let rel_ph = q.placeholder(id_value(related_id), join.column(&rel_fk));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} = {}",
        quoted(&join.name),
        quoted(&fk),
        id_ph,
        quoted(&rel_fk),
        rel_ph
    );
    q
}
