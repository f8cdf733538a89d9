//! Acting user from the headers the authentication layer sets (`X-User-Id`, `X-User-Admin`).

use crate::user::UserContext;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ADMIN_HEADER: &str = "X-User-Admin";

/// Missing or malformed headers yield an anonymous user; the engine rejects it where a login is needed.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserContext);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn user_from_headers(headers: &HeaderMap) -> UserContext {
    let id = header(headers, USER_ID_HEADER).and_then(|s| s.parse::<i64>().ok());
    let admin = header(headers, USER_ADMIN_HEADER)
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
        .unwrap_or(false);
    UserContext { id, admin }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(user_from_headers(&parts.headers)))
    }
}
