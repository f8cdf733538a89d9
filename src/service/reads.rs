//! Read side: list (live or soft-deleted rows) and read by id.

use crate::error::AppError;
use crate::service::engine::EntityEngine;
use crate::service::SqlExecutor;
use crate::sql::{select_by_id, select_list, OrderBy};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Query string of list requests: `?limit=&offset=&order_by=name:desc,id`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub deleted: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<String>,
}

impl ListQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    /// `col[:asc|:desc]` entries, comma separated.
    pub fn order(&self) -> Result<OrderBy, AppError> {
        let Some(raw) = self.order_by.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|part| match part.split_once(':') {
                None => Ok((part.to_string(), false)),
                Some((col, "asc")) => Ok((col.to_string(), false)),
                Some((col, "desc")) => Ok((col.to_string(), true)),
                Some((_, dir)) => Err(AppError::BadRequest(format!("unknown sort direction {}", dir))),
            })
            .collect()
    }
}

impl EntityEngine {
    pub async fn list<E>(&self, db: &mut E, table_name: &str, query: &ListQuery) -> Result<Vec<Value>, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.catalog().resource(table_name)?;
        let order = query.order()?;
        if let Some((col, _)) = order.iter().find(|(col, _)| !table.has_column(col)) {
            return Err(AppError::BadRequest(format!("cannot order {} by {}", table.name, col)));
        }
        let q = select_list(table, query.deleted, &order, Some(query.limit()), query.offset);
        db.fetch_all(&q).await
    }

    pub async fn read<E>(&self, db: &mut E, table_name: &str, id: i64) -> Result<Value, AppError>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.catalog().resource(table_name)?;
        db.fetch_optional(&select_by_id(table, id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", table.name, id)))
    }
}
