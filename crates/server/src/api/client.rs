//! Request-side security context: client address and user-agent.

use crate::context::SecurityContext;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::USER_AGENT, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Client address and user-agent of the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: String,
}

impl ClientInfo {
    /// Bind the request's address and user-agent to a client-computed
    /// browser fingerprint.
    pub fn security_context(&self, browser_fingerprint: &str) -> SecurityContext {
        SecurityContext::new(
            self.ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            self.user_agent.clone(),
            browser_fingerprint,
        )
    }
}

/// First `X-Forwarded-For` entry, falling back to the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or(peer)
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(ClientInfo {
            ip: client_ip(&parts.headers, peer),
            user_agent,
        })
    }
}
