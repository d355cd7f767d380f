//! SSO endpoints: code issuance and verification, token refresh and revocation.

use crate::AppResources;
use crate::api::client::ClientInfo;
use crate::error::{PublicReason, SsoError};
use crate::service::IssuedCode;
use crate::tokens::{RevokeTarget, TokenPair};
use axum::{
    Extension, Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const SSO_TAG: &str = "SSO";

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(issue_code))
        .routes(routes!(verify_code))
        .routes(routes!(refresh_token))
        .routes(routes!(revoke_token))
}

/// Error body. `reason` is one of a small fixed set; storage details never
/// appear here.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[schema(example = "code_expired")]
    pub reason: String,
}

fn status_for(reason: PublicReason) -> StatusCode {
    match reason {
        PublicReason::NotFound => StatusCode::NOT_FOUND,
        PublicReason::CodeExpired
        | PublicReason::CodeRevoked
        | PublicReason::ContextMismatch
        | PublicReason::InvalidToken => StatusCode::UNAUTHORIZED,
        PublicReason::InvalidRequest => StatusCode::BAD_REQUEST,
        PublicReason::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for(reason: PublicReason) -> &'static str {
    match reason {
        PublicReason::NotFound => "The requested resource was not found",
        PublicReason::CodeExpired => "The authorization code has expired",
        PublicReason::CodeRevoked => "The authorization code is no longer active",
        PublicReason::ContextMismatch => "The request does not match the context the code was issued to",
        PublicReason::InvalidToken => "The token is invalid or expired",
        PublicReason::InvalidRequest => "The request is malformed",
        PublicReason::ServerError => "Internal server error",
    }
}

impl IntoResponse for SsoError {
    fn into_response(self) -> Response {
        let reason = self.public_reason();
        if self.is_persistence() {
            tracing::error!(error = %self, "Request failed on storage");
        }
        (
            status_for(reason),
            Json(ErrorResponse {
                error: message_for(reason).to_string(),
                reason: reason.as_str().to_string(),
            }),
        )
            .into_response()
    }
}

fn require(field: &str, value: &str) -> Result<(), SsoError> {
    if value.trim().is_empty() {
        return Err(SsoError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueCodeRequest {
    pub username: String,
    pub password: String,
    pub application_id: String,
    pub browser_fingerprint: String,
    /// Requested lifetime in seconds. Clamped to the configured maximum.
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[tracing::instrument(skip_all, fields(application_id = %payload.application_id))]
#[utoipa::path(
    post,
    path = "/codes",
    tag = SSO_TAG,
    operation_id = "Issue Authorization Code",
    summary = "Log in and obtain an authorization code for an application",
    description = "Authenticates the user and issues an authorization code bound to the calling \
                   client's IP address, user-agent and browser fingerprint.\n\n\
                   The code can be verified repeatedly until it expires or is revoked, but only from a \
                   matching context.",
    request_body(content = IssueCodeRequest),
    responses(
        (status = 200, description = "Code issued", body = IssuedCode),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 404, description = "Unknown user, wrong password or unknown application", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn issue_code(
    Extension(resources): Extension<AppResources>,
    client: ClientInfo,
    Json(payload): Json<IssueCodeRequest>,
) -> Result<Json<IssuedCode>, SsoError> {
    require("application_id", &payload.application_id)?;
    require("browser_fingerprint", &payload.browser_fingerprint)?;
    let service = &resources.service;
    let context = client.security_context(&payload.browser_fingerprint);
    let user = service
        .login(&payload.username, &payload.password, &context)
        .await?;
    let issued = service
        .issue_code_with_ttl(
            user.uuid,
            &payload.application_id,
            &context,
            payload.ttl_seconds.map(time::Duration::seconds),
        )
        .await?;
    Ok(Json(issued))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub code: String,
    pub browser_fingerprint: String,
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/codes/verify",
    tag = SSO_TAG,
    operation_id = "Verify Authorization Code",
    summary = "Exchange an authorization code for a token pair",
    description = "Verifies the code against the context it was issued to and, on success, returns a \
                   fresh access/refresh token pair. Every attempt is recorded in the audit log.",
    request_body(content = VerifyCodeRequest),
    responses(
        (status = 200, description = "Code verified", body = TokenPair),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Code expired, revoked or presented from a different context", body = ErrorResponse),
        (status = 404, description = "Unknown code", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn verify_code(
    Extension(resources): Extension<AppResources>,
    client: ClientInfo,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<TokenPair>, SsoError> {
    require("code", &payload.code)?;
    require("browser_fingerprint", &payload.browser_fingerprint)?;
    let tokens = resources
        .service
        .verify_code(
            &payload.code,
            &client.security_context(&payload.browser_fingerprint),
        )
        .await?;
    Ok(Json(tokens))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/tokens/refresh",
    tag = SSO_TAG,
    operation_id = "Refresh Token",
    summary = "Rotate a refresh token",
    description = "Revokes the presented refresh token and returns a new pair. A refresh token can be \
                   used exactly once.",
    request_body(content = RefreshRequest),
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token unknown, revoked or expired", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn refresh_token(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, SsoError> {
    require("refresh_token", &payload.refresh_token)?;
    Ok(Json(resources.service.refresh_token(&payload.refresh_token).await?))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RevokeRequest {
    /// Revoke the pair this refresh token belongs to.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Revoke every session of the user the bearer access token belongs to.
    #[serde(default)]
    pub all_sessions: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    pub revoked: u64,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[tracing::instrument(skip_all, fields(all_sessions = payload.all_sessions))]
#[utoipa::path(
    post,
    path = "/tokens/revoke",
    tag = SSO_TAG,
    operation_id = "Revoke Token",
    summary = "Log out one session or all sessions",
    description = "With `refresh_token`, revokes that token pair. With `all_sessions: true`, revokes every \
                   token pair of the user identified by the `Authorization: Bearer` access token.",
    request_body(content = RevokeRequest),
    responses(
        (status = 200, description = "Number of token pairs revoked", body = RevokeResponse),
        (status = 400, description = "Neither a refresh token nor all_sessions given", body = ErrorResponse),
        (status = 401, description = "Token unknown or expired", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
async fn revoke_token(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
    Json(payload): Json<RevokeRequest>,
) -> Result<Json<RevokeResponse>, SsoError> {
    let target = if payload.all_sessions {
        let access = bearer(&headers).ok_or(SsoError::InvalidToken)?;
        let token = resources.service.authenticate(access).await?;
        RevokeTarget::User(token.user_uuid)
    } else {
        match payload.refresh_token {
            Some(refresh) if !refresh.trim().is_empty() => RevokeTarget::RefreshToken(refresh),
            _ => {
                return Err(SsoError::InvalidInput(
                    "refresh_token or all_sessions is required".to_string(),
                ));
            }
        }
    };
    let revoked = resources.service.revoke_token(target).await?;
    Ok(Json(RevokeResponse { revoked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer tok-123".parse().unwrap());
        assert_eq!(bearer(&headers), Some("tok-123"));
    }

    #[test]
    fn every_reason_has_a_status() {
        assert_eq!(status_for(PublicReason::ContextMismatch), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(PublicReason::InvalidRequest), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(PublicReason::ServerError), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(PublicReason::NotFound), StatusCode::NOT_FOUND);
    }
}
