//! Per-instance ownership checks against `user_has_<table>` joins.

use crate::config::{foreign_key, ownership_table, Catalog};
use crate::error::AppError;
use crate::service::SqlExecutor;
use crate::sql::select_ownership;
use crate::user::UserContext;
use serde_json::{Map, Value};

/// Empty strings and nulls count as "not supplied".
pub(crate) fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parse a body value as a row id (numbers or numeric strings).
pub(crate) fn parse_id(field: &str, v: &Value) -> Result<i64, AppError> {
    let parsed = match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::BadRequest(format!("{} must be an integer id", field)))
}

/// The user must hold an ownership row for `(user.id, id)`. Admins get no bypass here.
pub async fn verify_ownership<E>(
    db: &mut E,
    catalog: &Catalog,
    user: &UserContext,
    table: &str,
    id: i64,
) -> Result<(), AppError>
where
    E: SqlExecutor + ?Sized,
{
    let user_id = user.require_id()?;
    let owner_table = catalog
        .table(&ownership_table(table))
        .ok_or_else(|| AppError::Forbidden(format!("{} is not user-owned", table)))?;
    let q = select_ownership(owner_table, table, user_id, id);
    match db.fetch_optional(&q).await? {
        Some(_) => Ok(()),
        None => {
            tracing::debug!(table = %table, id, user_id, "ownership check failed");
            Err(AppError::not_owner(table, id))
        }
    }
}

/// For every `name` whose `<name>_id` is supplied in `body`, the user must own that referenced row.
/// Stops at the first failure.
pub async fn verify_multiple_ownership<E>(
    db: &mut E,
    catalog: &Catalog,
    user: &UserContext,
    body: &Map<String, Value>,
    owned_fields: &[String],
) -> Result<(), AppError>
where
    E: SqlExecutor + ?Sized,
{
    for name in owned_fields {
        let key = foreign_key(name);
        let Some(v) = body.get(&key) else { continue };
        if is_blank(v) {
            continue;
        }
        let id = parse_id(&key, v)?;
        verify_ownership(db, catalog, user, name, id).await?;
    }
    Ok(())
}
