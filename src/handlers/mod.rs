//! HTTP handlers for entities and their relation rows.

pub mod entity;
pub mod relation;
