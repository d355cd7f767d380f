//! Token lifecycle: mint, rotate, revoke and authenticate access/refresh pairs.

use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::credentials::TokenGenerator;
use crate::entity::user_token::{self, DeviceMeta};
use crate::error::{SsoError, SsoResult};
use crate::metrics::Metrics;
use crate::store::TokenStore;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// The credentials handed to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TokenPair {
    pub token_uuid: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_token_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_token_expires_at: OffsetDateTime,
}

impl From<&user_token::Model> for TokenPair {
    fn from(token: &user_token::Model) -> Self {
        Self {
            token_uuid: token.uuid,
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            access_token_expires_at: token.access_token_expires_at,
            refresh_token_expires_at: token.refresh_token_expires_at,
        }
    }
}

/// What to revoke.
#[derive(Clone, Debug)]
pub enum RevokeTarget {
    Token(Uuid),
    RefreshToken(String),
    User(Uuid),
}

#[derive(Clone)]
pub struct TokenManager {
    store: TokenStore,
    config: TokenConfig,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    metrics: Arc<Metrics>,
}

impl TokenManager {
    pub fn new(
        store: TokenStore,
        config: TokenConfig,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TokenGenerator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            generator,
            metrics,
        }
    }

    fn new_record(
        &self,
        user_uuid: Uuid,
        device: &DeviceMeta,
        now: OffsetDateTime,
    ) -> user_token::ActiveModel {
        user_token::new_active_model(
            user_uuid,
            self.generator.generate(),
            self.generator.generate(),
            device,
            now,
            now + time::Duration::seconds(self.config.access_token_lifetime),
            now + time::Duration::seconds(self.config.refresh_token_lifetime),
        )
    }

    #[tracing::instrument(skip(self, device))]
    pub async fn issue(&self, user_uuid: Uuid, device: &DeviceMeta) -> SsoResult<TokenPair> {
        let now = self.clock.now();
        let token = self.store.insert(self.new_record(user_uuid, device, now)).await?;
        self.metrics.token_issued();
        tracing::debug!(token_uuid = %token.uuid, "Issued token pair");
        Ok(TokenPair::from(&token))
    }

    /// Exchange a refresh token for a new pair, revoking the presented one.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> SsoResult<TokenPair> {
        let now = self.clock.now();
        let existing = self
            .store
            .find_by_refresh(refresh_token)
            .await?
            .ok_or(SsoError::InvalidToken)?;
        if !existing.is_valid_at(now) {
            tracing::info!(token_uuid = %existing.uuid, "Refresh with revoked or expired token");
            return Err(SsoError::InvalidToken);
        }

        let device = DeviceMeta {
            device_info: existing.device_info.clone(),
            ip_address: existing.ip_address.clone(),
            user_agent: existing.user_agent.clone(),
        };
        let replacement = self.new_record(existing.user_uuid, &device, now);
        let Some(rotated) = self.store.rotate(existing.uuid, replacement, now).await? else {
            tracing::warn!(token_uuid = %existing.uuid, "Refresh lost race against a concurrent rotation");
            return Err(SsoError::InvalidToken);
        };
        self.metrics.token_refreshed();
        tracing::debug!(old = %existing.uuid, new = %rotated.uuid, "Rotated token pair");
        Ok(TokenPair::from(&rotated))
    }

    /// Revoke one pair or every pair of a user. Returns how many records changed.
    #[tracing::instrument(skip_all)]
    pub async fn revoke(&self, target: RevokeTarget) -> SsoResult<u64> {
        let now = self.clock.now();
        let count = match target {
            RevokeTarget::Token(uuid) => u64::from(self.store.revoke(uuid, now).await?),
            RevokeTarget::RefreshToken(value) => match self.store.find_by_refresh(&value).await? {
                Some(token) => u64::from(self.store.revoke(token.uuid, now).await?),
                None => return Err(SsoError::InvalidToken),
            },
            RevokeTarget::User(user_uuid) => self.store.revoke_all_for_user(user_uuid, now).await?,
        };
        tracing::info!(count, "Revoked tokens");
        Ok(count)
    }

    /// Resolve a live access token and stamp its last use.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, access_token: &str) -> SsoResult<user_token::Model> {
        let now = self.clock.now();
        let token = self
            .store
            .find_by_access(access_token)
            .await?
            .ok_or(SsoError::InvalidToken)?;
        if token.is_access_token_expired_at(now) {
            return Err(SsoError::InvalidToken);
        }
        if !self.store.touch(token.uuid, now).await? {
            return Err(SsoError::InvalidToken);
        }
        Ok(user_token::Model {
            last_used_at: Some(now),
            ..token
        })
    }
}
