//! Entity handlers: list, read, ownership, create, update, soft delete, clone, revive, canon.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::{created_id, success_many, success_one_ok};
use crate::service::{CrudService, ListQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

pub(crate) fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id {}", id_str)))
}

pub(crate) fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn parse_flag(s: &str) -> Result<bool, AppError> {
    match s {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::BadRequest(format!("invalid flag {}", s))),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(mut query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.deleted = false;
    let rows = CrudService::list(&state.pool, &state.engine(), &table, &query).await?;
    Ok(success_many(rows))
}

pub async fn list_deleted(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(mut query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.deleted = true;
    let rows = CrudService::list(&state.pool, &state.engine(), &table, &query).await?;
    Ok(success_many(rows))
}

pub async fn read(
    State(state): State<AppState>,
    Path((table, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state.pool, &state.engine(), &table, id).await?;
    Ok(success_one_ok(row))
}

/// `{"data": {"ownership": bool}}` for the acting user.
pub async fn ownership(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let owned = CrudService::ownership(&state.pool, &state.engine(), &user, &table, id).await?;
    Ok(success_one_ok(serde_json::json!({ "ownership": owned })))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let body = body_to_map(body)?;
    let id = CrudService::create(&state.pool, &state.engine(), &user, &table, &body).await?;
    Ok(created_id(id))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let body = body_to_map(body)?;
    CrudService::update(&state.pool, &state.engine(), &user, &table, id, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    CrudService::soft_delete(&state.pool, &state.engine(), &user, &table, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let new_id = CrudService::clone_resource(&state.pool, &state.engine(), &user, &table, id).await?;
    Ok(created_id(new_id))
}

pub async fn revive(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    CrudService::revive(&state.pool, &state.engine(), &user, &table, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_canon(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((table, id_str, value)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id_str)?;
    let canon = parse_flag(&value)?;
    CrudService::set_canon(&state.pool, &state.engine(), &user, &table, id, canon).await?;
    Ok(StatusCode::NO_CONTENT)
}
