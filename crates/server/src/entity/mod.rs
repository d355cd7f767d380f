//! SeaORM entities for the SSO core.
//!
//! Rows are created through explicit constructors (`new_active_model` in each
//! module, `AuditRecord::into_active_model` and `LoginAttempt::into_active_model`
//! for log rows) that assign the UUID (v7) and timestamps exactly once.

pub mod application;
pub mod authorization_code;
pub mod authorization_log;
pub mod login_log;
pub mod role;
pub mod user;
pub mod user_role;
pub mod user_token;
