//! Schema for the SSO authorization core.
//!
//! The migration list below is the single registry of persisted entity types.
//! It is built once and applied at process start by the server (or on demand via
//! the `migration` binary); nothing re-derives the schema per request.

pub use sea_orm_migration::prelude::*;

mod m20250801_000001_create_users_and_applications;
mod m20250801_000002_create_authorization_codes;
mod m20250801_000003_create_authorization_logs;
mod m20250801_000004_create_user_tokens;
mod m20250801_000005_create_roles;
mod m20250801_000006_create_login_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_users_and_applications::Migration),
            Box::new(m20250801_000002_create_authorization_codes::Migration),
            Box::new(m20250801_000003_create_authorization_logs::Migration),
            Box::new(m20250801_000004_create_user_tokens::Migration),
            Box::new(m20250801_000005_create_roles::Migration),
            Box::new(m20250801_000006_create_login_logs::Migration),
        ]
    }
}
