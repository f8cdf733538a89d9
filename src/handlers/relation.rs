//! Relation handlers under `/:table/:id/relations/:relation`.

use crate::config::foreign_key;
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::handlers::entity::{body_to_map, parse_id};
use crate::response::success_many;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

pub async fn list(
    State(state): State<AppState>,
    Path((table, id_str, relation)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let rows = CrudService::list_relations(&state.pool, &state.engine(), &table, id, &relation).await?;
    Ok(success_many(rows))
}

/// Body: `{"<relation>_id": 11, "value": 2}`; `value` is optional.
pub async fn add(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str, relation)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let mut body = body_to_map(body)?;
    let key = foreign_key(&relation);
    let related_id = match body.get(&key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::Validation(format!("{} is required", key)))?;
    let value = body.remove("value");
    CrudService::add_relation(&state.pool, &state.engine(), &user, &table, id, &relation, related_id, value).await?;
    Ok(StatusCode::CREATED)
}

/// Body: `{"value": 3}`.
pub async fn set_value(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str, relation, related_str)): Path<(String, String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let related_id = parse_id(&related_str)?;
    let value = body_to_map(body)?
        .remove("value")
        .ok_or_else(|| AppError::Validation("value is required".into()))?;
    CrudService::set_relation_value(&state.pool, &state.engine(), &user, &table, id, &relation, related_id, value).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str, relation, related_str)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let related_id = parse_id(&related_str)?;
    CrudService::remove_relation(&state.pool, &state.engine(), &user, &table, id, &relation, related_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
