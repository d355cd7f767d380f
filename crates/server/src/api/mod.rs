//! HTTP adapter over [`SsoService`](crate::service::SsoService).
//!
//! - `health` - liveness endpoints (/api/v1/health/ping, /api/v1/public/ping)
//! - `sso` - code and token endpoints (/api/v1/sso/*)
//! - `metrics` - Prometheus metrics endpoint (/metrics)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod client;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod sso;

pub use health::MISC_TAG;
pub use sso::SSO_TAG;

use crate::AppResources;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the application router with documentation mounted at `/api-docs`.
pub fn router(app_resources: AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/v1/sso", sso::router())
        .routes(routes!(metrics::metrics))
        .routes(routes!(health::health_ping))
        .routes(routes!(health::public_ping))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on the configured listen address.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let listen_addr = app_resources.config.listen_addr.clone();
    let router = router(app_resources);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
