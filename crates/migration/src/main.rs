use config::{Config, Environment, File};
use sea_orm_migration::prelude::*;
use std::env;

/// Resolve the database URL the same way the server does: an explicit
/// `DATABASE_URL` wins, then `config.yaml` with `__`-separated env overrides.
fn resolve_database_url() -> Option<String> {
    if let Ok(url) = env::var("DATABASE_URL") {
        return Some(url);
    }
    let settings = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()
        .ok()?;
    settings.get_string("database_url").ok()
}

#[tokio::main]
async fn main() {
    match resolve_database_url() {
        Some(url) => env::set_var("DATABASE_URL", url),
        None => {
            eprintln!("DATABASE_URL is not set and config.yaml has no database_url");
            std::process::exit(1);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
