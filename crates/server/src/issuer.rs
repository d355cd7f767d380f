//! Authorization code issuance.

use crate::clock::Clock;
use crate::config::AuthorizationConfig;
use crate::context::SecurityContext;
use crate::credentials::TokenGenerator;
use crate::entity::authorization_code;
use crate::error::{SsoError, SsoResult};
use crate::metrics::Metrics;
use crate::store::{CodeStore, Directory};
use std::sync::Arc;
use time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct CodeIssuer {
    codes: CodeStore,
    directory: Directory,
    config: AuthorizationConfig,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    metrics: Arc<Metrics>,
}

impl CodeIssuer {
    pub fn new(
        codes: CodeStore,
        directory: Directory,
        config: AuthorizationConfig,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TokenGenerator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            codes,
            directory,
            config,
            clock,
            generator,
            metrics,
        }
    }

    /// Resolve the lifetime of a new code: the configured default when none
    /// is requested, otherwise the request clamped to the configured maximum.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> SsoResult<Duration> {
        let max = Duration::seconds(self.config.max_code_ttl);
        match requested {
            None => Ok(Duration::seconds(self.config.default_code_ttl).min(max)),
            Some(ttl) if ttl <= Duration::ZERO => {
                Err(SsoError::InvalidInput("ttl must be positive".to_string()))
            }
            Some(ttl) => Ok(ttl.min(max)),
        }
    }

    /// Issue a code for an active user and an active application, bound to
    /// the requesting context.
    #[tracing::instrument(skip(self, context), fields(code_uuid))]
    pub async fn issue(
        &self,
        user_uuid: Uuid,
        application_id: &str,
        context: &SecurityContext,
        ttl: Option<Duration>,
    ) -> SsoResult<authorization_code::Model> {
        let ttl = self.effective_ttl(ttl)?;
        let user = self
            .directory
            .find_active_user(user_uuid)
            .await?
            .ok_or(SsoError::NotFound)?;
        let application = self
            .directory
            .find_active_application(application_id)
            .await?
            .ok_or(SsoError::NotFound)?;

        let now = self.clock.now();
        let model = authorization_code::new_active_model(
            self.generator.generate(),
            user.uuid,
            application.uuid,
            context,
            now,
            now + ttl,
        );
        let code = self.codes.insert(model).await?;
        tracing::Span::current().record("code_uuid", tracing::field::display(code.uuid));

        if self.config.supersede_previous_codes {
            let superseded = self
                .codes
                .deactivate_for_pair(user.uuid, application.uuid, Some(code.uuid), now)
                .await?;
            if superseded > 0 {
                tracing::info!(superseded, "Deactivated previous codes for user/application pair");
            }
        }

        self.metrics.code_issued();
        tracing::info!(expires_at = %code.expires_at, "Issued authorization code");
        Ok(code)
    }
}
