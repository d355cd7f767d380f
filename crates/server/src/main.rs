use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use sso_server::AppResources;
use sso_server::api::start_webserver;
use sso_server::config::load_config;
use sso_server::seed::{seed_applications, seed_roles};
use sso_server::service::SsoService;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "sso_server=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    let config = Arc::new(load_config()?);

    let db = Arc::new(Database::connect(&config.database_url).await?);
    Migrator::up(db.as_ref(), None).await?;
    tracing::info!("Database migrations applied");

    let service = SsoService::with_system_defaults(db, &config);
    let roles_created = seed_roles(&service, &config.roles).await?;
    let created = seed_applications(&service, &config.applications).await?;
    // Secrets go to the terminal only, never into the structured log.
    for registered in &created {
        eprintln!(
            "Created application '{}'. Its secret is shown only once: {}",
            registered.application.application_id, registered.application_secret
        );
    }
    tracing::info!(
        configured = config.applications.len(),
        created = created.len(),
        roles_created,
        code_ttl = config.authorization.default_code_ttl,
        ip_mode = ?config.authorization.match_policy.ip_mode,
        ip_enforcement = ?config.authorization.match_policy.ip_enforcement,
        supersede_previous_codes = config.authorization.supersede_previous_codes,
        "SSO configuration"
    );

    start_webserver(AppResources { service, config }).await
}
