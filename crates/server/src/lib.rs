//! A single-sign-on authorization core.
//!
//! Applications obtain long-lived, multi-use authorization codes bound to the
//! `{ip, user-agent, fingerprint}` context of the request that asked for them.
//! Presenting a code from a matching context yields an access/refresh token
//! pair; every verification attempt is written to an audit log.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::SsoService;

pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod issuer;
pub mod metrics;
pub mod seed;
pub mod service;
pub mod store;
pub mod tokens;
pub mod verifier;

#[derive(Clone)]
pub struct AppResources {
    pub service: SsoService,
    pub config: Arc<AppConfig>,
}
