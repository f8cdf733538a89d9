//! The acting user, as established by the authentication layer in front of the engine.

use crate::error::AppError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserContext {
    /// Absent for anonymous requests.
    pub id: Option<i64>,
    pub admin: bool,
}

impl UserContext {
    pub fn new(id: i64, admin: bool) -> Self {
        UserContext { id: Some(id), admin }
    }

    pub fn anonymous() -> Self {
        UserContext::default()
    }

    pub fn require_id(&self) -> Result<i64, AppError> {
        self.id.ok_or(AppError::Unauthenticated)
    }
}
