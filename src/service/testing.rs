//! In-memory executor for engine tests: records statements, answers from scripted rules.

use crate::config::{resolve, Catalog, CatalogManifest};
use crate::error::AppError;
use crate::service::SqlExecutor;
use crate::sql::QueryBuf;
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub enum Reply {
    Rows(Vec<Value>),
    Affected(u64),
    Fail(String),
}

impl Reply {
    pub fn rows(rows: Vec<Value>) -> Self {
        Reply::Rows(rows)
    }

    pub fn affected(n: u64) -> Self {
        Reply::Affected(n)
    }

    pub fn fail(msg: &str) -> Self {
        Reply::Fail(msg.to_string())
    }
}

/// Rules match on a substring of the statement text; the first matching rule wins.
/// Unmatched `INSERT ... RETURNING` yields a fresh id (starting at 100); other unmatched
/// reads return no rows and unmatched writes affect one row.
pub struct RecordingExecutor {
    pub statements: Vec<QueryBuf>,
    rules: Vec<(String, Reply)>,
    next_id: i64,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        RecordingExecutor {
            statements: Vec::new(),
            rules: Vec::new(),
            next_id: 100,
        }
    }

    pub fn on(mut self, pattern: &str, reply: Reply) -> Self {
        self.rules.push((pattern.to_string(), reply));
        self
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|q| q.sql.as_str()).collect()
    }

    fn reply_for(&self, sql: &str) -> Option<Reply> {
        self.rules.iter().find(|(p, _)| sql.contains(p.as_str())).map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn fetch_all(&mut self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        self.statements.push(q.clone());
        match self.reply_for(&q.sql) {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Affected(_)) => Ok(Vec::new()),
            Some(Reply::Fail(msg)) => Err(AppError::Db(sqlx::Error::Protocol(msg))),
            None if q.sql.starts_with("INSERT") && q.sql.contains("RETURNING") => {
                let id = self.next_id;
                self.next_id += 1;
                Ok(vec![json!({ "id": id })])
            }
            None => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, q: &QueryBuf) -> Result<u64, AppError> {
        self.statements.push(q.clone());
        match self.reply_for(&q.sql) {
            Some(Reply::Rows(rows)) => Ok(rows.len() as u64),
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Fail(msg)) => Err(AppError::Db(sqlx::Error::Protocol(msg))),
            None => Ok(1),
        }
    }
}

/// A small game schema: user-owned `weapon` and `asset`, admin-managed `species`.
pub fn catalog() -> Catalog {
    let manifest: CatalogManifest = serde_json::from_value(json!({
        "tables": [
            { "name": "asset", "columns": [
                { "name": "id" }, { "name": "user_id" }, { "name": "name" }, { "name": "deleted" } ] },
            { "name": "species", "columns": [
                { "name": "id" }, { "name": "user_id" }, { "name": "canon" }, { "name": "name" },
                { "name": "created" }, { "name": "updated" }, { "name": "deleted" } ] },
            { "name": "species_has_attribute", "columns": [
                { "name": "species_id" }, { "name": "attribute_id" }, { "name": "value" } ] },
            { "name": "user_has_asset", "columns": [
                { "name": "user_id" }, { "name": "asset_id" }, { "name": "owner" } ] },
            { "name": "user_has_weapon", "columns": [
                { "name": "user_id" }, { "name": "weapon_id" }, { "name": "owner" } ] },
            { "name": "weapon", "columns": [
                { "name": "id" }, { "name": "user_id" }, { "name": "canon" }, { "name": "name" },
                { "name": "description" }, { "name": "asset_id" },
                { "name": "created" }, { "name": "updated" }, { "name": "deleted" } ],
              "ownership_fields": ["asset"] },
            { "name": "weapon_has_comment", "columns": [
                { "name": "weapon_id" }, { "name": "comment_id" } ] },
            { "name": "weapon_has_skill", "columns": [
                { "name": "weapon_id" }, { "name": "skill_id" }, { "name": "value" } ] },
            { "name": "weapon_is_copy", "columns": [
                { "name": "weapon_id" }, { "name": "copy_id" } ] },
            { "name": "weapon_is_species", "columns": [
                { "name": "weapon_id" }, { "name": "species_id" } ] }
        ]
    }))
    .expect("test manifest");
    resolve(&manifest).expect("test catalog")
}
