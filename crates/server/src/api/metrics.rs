//! Prometheus metrics endpoint.

use crate::AppResources;
use crate::api::client::ClientInfo;
use crate::api::health::MISC_TAG;
use axum::{
    Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Prometheus metrics endpoint.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/metrics",
    tag = MISC_TAG,
    operation_id = "Prometheus Metrics",
    description = "Counters for issued codes, verification outcomes by reason, audit write failures and token activity.\n\n\
                   **Access control:** Only accessible from networks listed in `metrics_allowed_nets`.",
    responses(
        (status = 200, description = "Prometheus metrics in text exposition format", body = String, content_type = "text/plain"),
        (status = 403, description = "Access denied - client IP not in allowed networks")
    )
)]
pub async fn metrics(Extension(resources): Extension<AppResources>, client: ClientInfo) -> Response {
    let allowed = client
        .ip
        .map(|ip| {
            resources
                .config
                .metrics_allowed_nets
                .iter()
                .any(|net| net.contains(&ip))
        })
        .unwrap_or(false);
    if !allowed {
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }
    (StatusCode::OK, resources.service.metrics().render_prometheus()).into_response()
}
