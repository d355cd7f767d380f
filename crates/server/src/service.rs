//! The caller-facing engine: one cloneable handle over issuance,
//! verification, tokens, revocation and the audit trail.

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::context::SecurityContext;
use crate::credentials::{OsTokenGenerator, TokenGenerator};
use crate::entity::role::NewRole;
use crate::entity::{authorization_log, login_log, role, user, user_role, user_token};
use crate::error::{SsoError, SsoResult};
use crate::issuer::CodeIssuer;
use crate::metrics::Metrics;
use crate::store::{AuditLog, CodeStore, Db, Directory, RoleStore, TokenStore};
use crate::tokens::{RevokeTarget, TokenManager, TokenPair};
use crate::verifier::{CodeVerifier, VerifiedGrant};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// A freshly issued code as handed to the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct IssuedCode {
    pub code: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// What `deactivate_user` touched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeactivationSummary {
    pub codes_revoked: u64,
    pub tokens_revoked: u64,
}

#[derive(Clone)]
pub struct SsoService {
    issuer: CodeIssuer,
    verifier: CodeVerifier,
    tokens: TokenManager,
    codes: CodeStore,
    audit: AuditLog,
    directory: Directory,
    roles: RoleStore,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    metrics: Arc<Metrics>,
}

impl SsoService {
    pub fn new(
        conn: Arc<DatabaseConnection>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TokenGenerator>,
    ) -> Self {
        let db = Db::new(conn, config.storage.timeout());
        let metrics = Arc::new(Metrics::new());
        let codes = CodeStore::new(db.clone());
        let audit = AuditLog::new(db.clone());
        let directory = Directory::new(db.clone());
        let roles = RoleStore::new(db.clone());
        let tokens = TokenManager::new(
            TokenStore::new(db),
            config.tokens.clone(),
            clock.clone(),
            generator.clone(),
            metrics.clone(),
        );
        let issuer = CodeIssuer::new(
            codes.clone(),
            directory.clone(),
            config.authorization.clone(),
            clock.clone(),
            generator.clone(),
            metrics.clone(),
        );
        let verifier = CodeVerifier::new(
            codes.clone(),
            audit.clone(),
            tokens.clone(),
            config.authorization.match_policy,
            clock.clone(),
            metrics.clone(),
        );
        Self {
            issuer,
            verifier,
            tokens,
            codes,
            audit,
            directory,
            roles,
            clock,
            generator,
            metrics,
        }
    }

    /// Wall clock and OS entropy.
    pub fn with_system_defaults(conn: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        Self::new(conn, config, Arc::new(SystemClock), Arc::new(OsTokenGenerator))
    }

    /// Password login. Every attempt lands in the login log; any failure is
    /// reported as `NotFound` without saying what was wrong.
    #[tracing::instrument(skip_all)]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        context: &SecurityContext,
    ) -> SsoResult<user::Model> {
        self.directory
            .authenticate(username, password, context, self.clock.now())
            .await?
            .ok_or(SsoError::NotFound)
    }

    pub async fn login_history(
        &self,
        user_uuid: Uuid,
        limit: u64,
    ) -> SsoResult<Vec<login_log::Model>> {
        Ok(self.directory.logins().history_for_user(user_uuid, limit).await?)
    }

    pub async fn recent_failed_logins(&self, limit: u64) -> SsoResult<Vec<login_log::Model>> {
        Ok(self.directory.logins().recent_failures(limit).await?)
    }

    /// Create the role if missing. Returns `true` when it was created.
    pub async fn ensure_role(&self, new: &NewRole) -> SsoResult<(role::Model, bool)> {
        Ok(self.roles.ensure(new, self.clock.now()).await?)
    }

    /// Grant a role by name. Unknown users and roles are `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn assign_role(
        &self,
        user_uuid: Uuid,
        role_name: &str,
        assigned_by: Option<Uuid>,
        expires_at: Option<OffsetDateTime>,
    ) -> SsoResult<user_role::Model> {
        if self.directory.find_user(user_uuid).await?.is_none() {
            return Err(SsoError::NotFound);
        }
        let role = self
            .roles
            .find_by_name(role_name)
            .await?
            .ok_or(SsoError::NotFound)?;
        let assignment = self
            .roles
            .assign(user_uuid, &role, assigned_by, expires_at, self.clock.now())
            .await?;
        tracing::info!("Assigned role");
        Ok(assignment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn unassign_role(&self, user_uuid: Uuid, role_name: &str) -> SsoResult<bool> {
        let role = self
            .roles
            .find_by_name(role_name)
            .await?
            .ok_or(SsoError::NotFound)?;
        Ok(self.roles.unassign(user_uuid, &role, self.clock.now()).await?)
    }

    /// Roles in effect right now, sorted by name.
    pub async fn roles_for_user(&self, user_uuid: Uuid) -> SsoResult<Vec<role::Model>> {
        Ok(self.roles.roles_for_user(user_uuid, self.clock.now()).await?)
    }

    pub async fn issue_code(
        &self,
        user_uuid: Uuid,
        application_id: &str,
        context: &SecurityContext,
    ) -> SsoResult<IssuedCode> {
        self.issue_code_with_ttl(user_uuid, application_id, context, None)
            .await
    }

    pub async fn issue_code_with_ttl(
        &self,
        user_uuid: Uuid,
        application_id: &str,
        context: &SecurityContext,
        ttl: Option<time::Duration>,
    ) -> SsoResult<IssuedCode> {
        let code = self
            .issuer
            .issue(user_uuid, application_id, context, ttl)
            .await?;
        Ok(IssuedCode {
            code: code.code,
            expires_at: code.expires_at,
        })
    }

    pub async fn verify_code(
        &self,
        code: &str,
        context: &SecurityContext,
    ) -> SsoResult<TokenPair> {
        Ok(self.verifier.verify(code, context).await?.tokens)
    }

    /// Like [`verify_code`](Self::verify_code) but keeps the code, user and
    /// per-factor report for the caller.
    pub async fn verify_code_detailed(
        &self,
        code: &str,
        context: &SecurityContext,
    ) -> SsoResult<VerifiedGrant> {
        self.verifier.verify(code, context).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> SsoResult<TokenPair> {
        self.tokens.refresh(refresh_token).await
    }

    pub async fn revoke_token(&self, target: RevokeTarget) -> SsoResult<u64> {
        self.tokens.revoke(target).await
    }

    pub async fn authenticate(&self, access_token: &str) -> SsoResult<user_token::Model> {
        self.tokens.authenticate(access_token).await
    }

    /// Deactivate a single code. Revoking an already inactive code succeeds.
    #[tracing::instrument(skip_all)]
    pub async fn revoke_code(&self, code: &str) -> SsoResult<()> {
        let found = self
            .codes
            .find_by_code(code)
            .await?
            .ok_or(SsoError::NotFound)?;
        if self.codes.deactivate(found.uuid, self.clock.now()).await? {
            tracing::info!(code_uuid = %found.uuid, "Revoked authorization code");
        }
        Ok(())
    }

    /// Deactivate every active code a user holds for one application.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_codes_for(&self, user_uuid: Uuid, application_id: &str) -> SsoResult<u64> {
        let application = self
            .directory
            .find_application_by_id(application_id)
            .await?
            .ok_or(SsoError::NotFound)?;
        let count = self
            .codes
            .deactivate_for_pair(user_uuid, application.uuid, None, self.clock.now())
            .await?;
        tracing::info!(count, "Revoked authorization codes");
        Ok(count)
    }

    /// Soft-delete a user and revoke everything issued to them. Audit rows
    /// stay untouched.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_user(&self, user_uuid: Uuid) -> SsoResult<DeactivationSummary> {
        if self.directory.find_user(user_uuid).await?.is_none() {
            return Err(SsoError::NotFound);
        }
        let now = self.clock.now();
        self.directory.set_user_inactive(user_uuid, now).await?;
        let summary = DeactivationSummary {
            codes_revoked: self.codes.deactivate_for_user(user_uuid, now).await?,
            tokens_revoked: self.tokens.revoke(RevokeTarget::User(user_uuid)).await?,
        };
        tracing::info!(?summary, "Deactivated user");
        Ok(summary)
    }

    pub async fn code_history(
        &self,
        code_uuid: Uuid,
    ) -> SsoResult<Vec<authorization_log::Model>> {
        Ok(self.audit.history_for_code(code_uuid).await?)
    }

    pub async fn recent_failures(
        &self,
        application_id: &str,
        limit: u64,
    ) -> SsoResult<Vec<authorization_log::Model>> {
        let application = self
            .directory
            .find_application_by_id(application_id)
            .await?
            .ok_or(SsoError::NotFound)?;
        Ok(self
            .audit
            .recent_failures_for_application(application.uuid, limit)
            .await?)
    }

    pub async fn recent_lookup_misses(
        &self,
        limit: u64,
    ) -> SsoResult<Vec<authorization_log::Model>> {
        Ok(self.audit.recent_lookup_misses(limit).await?)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    pub fn codes(&self) -> &CodeStore {
        &self.codes
    }

    pub fn verifier(&self) -> &CodeVerifier {
        &self.verifier
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn generator(&self) -> &Arc<dyn TokenGenerator> {
        &self.generator
    }
}
