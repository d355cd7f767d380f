//! Shared fixtures: an in-memory database with the schema applied, a manual
//! clock and one active user and application.
#![allow(dead_code)]

use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection};
use sso_server::clock::ManualClock;
use sso_server::config::AppConfig;
use sso_server::context::SecurityContext;
use sso_server::credentials::OsTokenGenerator;
use sso_server::entity::application::{self, NewApplication};
use sso_server::entity::user;
use sso_server::service::SsoService;
use std::sync::Arc;
use time::OffsetDateTime;
use time::macros::datetime;

pub const APP_ID: &str = "portal";

pub fn start() -> OffsetDateTime {
    datetime!(2025-06-02 09:00 UTC)
}

pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("apply migrations");
    Arc::new(db)
}

pub fn test_config() -> AppConfig {
    AppConfig::with_database_url("sqlite::memory:")
}

pub struct Harness {
    pub db: Arc<DatabaseConnection>,
    pub clock: ManualClock,
    pub service: SsoService,
    pub user: user::Model,
    pub application: application::Model,
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: AppConfig) -> Harness {
    let db = setup_db().await;
    let clock = ManualClock::new(start());
    let service = SsoService::new(
        db.clone(),
        &config,
        Arc::new(clock.clone()),
        Arc::new(OsTokenGenerator),
    );
    let user = insert_user(&db, "alice").await;
    let application = insert_application(&db, APP_ID).await;
    Harness {
        db,
        clock,
        service,
        user,
        application,
    }
}

/// Inserts a user without hashing a password; login is not exercised.
pub async fn insert_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::new_active_model(
        username,
        &format!("{username}@example.com"),
        None,
        "not-a-phc-string".to_string(),
        start(),
    )
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn insert_application(db: &DatabaseConnection, application_id: &str) -> application::Model {
    let new = NewApplication {
        name: format!("{application_id} app"),
        application_id: application_id.to_string(),
        redirect_uris: vec![format!("https://{application_id}.example.com/callback")],
        ..Default::default()
    };
    application::new_active_model(&new, "not-a-phc-string".to_string(), start())
        .insert(db)
        .await
        .expect("insert application")
}

pub fn browser() -> SecurityContext {
    SecurityContext::new(
        "203.0.113.7",
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        "fp-9f86d081884c7d65",
    )
}
