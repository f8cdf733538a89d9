pub mod user;
pub use user::{user_from_headers, CurrentUser, USER_ADMIN_HEADER, USER_ID_HEADER};
