//! Liveness endpoints.

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Health check endpoint.
#[tracing::instrument()]
#[utoipa::path(
    method(get, head),
    path = "/api/v1/health/ping",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service health check",
    description = "Returns a simple status indicating the service is running and accepting requests.\n\n\
                   Supports both GET and HEAD for load balancer and orchestrator probes.",
    responses(
        (status = 200, description = "Service is healthy", body = str, content_type = "text/plain", example = "pong")
    )
)]
pub async fn health_ping() -> &'static str {
    "pong"
}

/// Unauthenticated ping for clients checking reachability.
#[tracing::instrument()]
#[utoipa::path(
    get,
    path = "/api/v1/public/ping",
    tag = MISC_TAG,
    operation_id = "Public Ping",
    responses(
        (status = 200, description = "Service is reachable", body = str, content_type = "text/plain", example = "pong")
    )
)]
pub async fn public_ping() -> &'static str {
    "pong"
}
