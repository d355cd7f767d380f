//! Authorization code verification.
//!
//! A presented code is resolved, checked for revocation and expiry, then its
//! bound context is compared with the presented one. Every outcome that
//! reaches the store leaves one audit row. On success the usage counter is
//! bumped first, the audit row written second, and tokens minted last.
//!
//! Each attempt runs in its own task. A caller that stops polling (a client
//! disconnect dropping the handler) does not cut the attempt short, so the
//! counter and its audit row always land together.

use crate::clock::Clock;
use crate::context::{MatchPolicy, MatchReport, SecurityContext};
use crate::entity::authorization_code;
use crate::entity::user_token::DeviceMeta;
use crate::error::{PersistenceError, SsoError, SsoResult};
use crate::metrics::Metrics;
use crate::store::{AuditLog, AuditRecord, CodeStore, FailureReason};
use crate::tokens::{TokenManager, TokenPair};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// A successful verification. The report stays server-side.
#[derive(Clone, Debug)]
pub struct VerifiedGrant {
    pub code_uuid: Uuid,
    pub user_uuid: Uuid,
    pub application_uuid: Uuid,
    pub report: MatchReport,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct CodeVerifier {
    codes: CodeStore,
    audit: AuditLog,
    tokens: TokenManager,
    policy: MatchPolicy,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl CodeVerifier {
    pub fn new(
        codes: CodeStore,
        audit: AuditLog,
        tokens: TokenManager,
        policy: MatchPolicy,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            codes,
            audit,
            tokens,
            policy,
            clock,
            metrics,
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Verify under the configured policy.
    pub async fn verify(&self, code: &str, presented: &SecurityContext) -> SsoResult<VerifiedGrant> {
        self.verify_with_policy(code, presented, &self.policy).await
    }

    #[tracing::instrument(skip_all, fields(code_uuid, reason))]
    pub async fn verify_with_policy(
        &self,
        code: &str,
        presented: &SecurityContext,
        policy: &MatchPolicy,
    ) -> SsoResult<VerifiedGrant> {
        let verifier = self.clone();
        let code = code.to_owned();
        let presented = presented.clone();
        let policy = *policy;
        let attempt = tokio::spawn(
            async move { verifier.attempt(&code, &presented, &policy).await }
                .instrument(tracing::Span::current()),
        );
        match attempt.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(PersistenceError::Interrupted(e.to_string()).into()),
        }
    }

    async fn attempt(
        &self,
        code: &str,
        presented: &SecurityContext,
        policy: &MatchPolicy,
    ) -> SsoResult<VerifiedGrant> {
        let result = self.run(code, presented, policy).await;
        match &result {
            Ok(_) => self.metrics.verification_succeeded(),
            Err(e) => {
                let reason = e.public_reason();
                tracing::Span::current().record("reason", reason.as_str());
                self.metrics.verification_failed(reason);
            }
        }
        result
    }

    async fn run(
        &self,
        value: &str,
        presented: &SecurityContext,
        policy: &MatchPolicy,
    ) -> SsoResult<VerifiedGrant> {
        let now = self.clock.now();
        let Some(code) = self.codes.find_by_code(value).await? else {
            tracing::info!("Verification with unknown code");
            self.write_audit(AuditRecord::lookup_miss(presented.clone()), now)
                .await;
            return Err(SsoError::NotFound);
        };
        tracing::Span::current().record("code_uuid", tracing::field::display(code.uuid));

        if !code.is_active {
            self.fail(&code, presented, FailureReason::CodeRevoked, None, now)
                .await;
            return Err(SsoError::Revoked);
        }
        if code.is_expired_at(now) {
            self.fail(&code, presented, FailureReason::CodeExpired, None, now)
                .await;
            return Err(SsoError::Expired);
        }

        let report = policy.evaluate(&code.security_context(), presented);
        if !report.is_match() {
            tracing::warn!(%report, "Security context mismatch");
            self.fail(&code, presented, FailureReason::ContextMismatch, Some(report), now)
                .await;
            return Err(SsoError::ContextMismatch(report));
        }

        match self.codes.record_use(code.uuid, now).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Code revoked while being verified");
                self.fail(&code, presented, FailureReason::CodeRevoked, Some(report), now)
                    .await;
                return Err(SsoError::Revoked);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to record code use");
                self.fail(&code, presented, FailureReason::StorageError, Some(report), now)
                    .await;
                return Err(e.into());
            }
        }

        self.write_audit(record_for(&code, presented, None, Some(report)), now)
            .await;

        let device = DeviceMeta {
            device_info: None,
            ip_address: Some(presented.ip_address.clone()),
            user_agent: Some(presented.user_agent.clone()),
        };
        let tokens = self.tokens.issue(code.user_uuid, &device).await?;
        if !report.ip_matched {
            tracing::info!(%report, "Verified with advisory IP mismatch");
        }
        Ok(VerifiedGrant {
            code_uuid: code.uuid,
            user_uuid: code.user_uuid,
            application_uuid: code.application_uuid,
            report,
            tokens,
        })
    }

    async fn fail(
        &self,
        code: &authorization_code::Model,
        presented: &SecurityContext,
        failure: FailureReason,
        report: Option<MatchReport>,
        now: OffsetDateTime,
    ) {
        self.write_audit(record_for(code, presented, Some(failure), report), now)
            .await;
    }

    /// Audit rows are best effort: a failed write is counted and logged but
    /// never changes the verification outcome.
    async fn write_audit(&self, record: AuditRecord, now: OffsetDateTime) {
        let code_uuid = record.code_uuid;
        if let Err(e) = self.audit.append(record, now).await {
            self.metrics.audit_write_failed();
            tracing::error!(error = %e, ?code_uuid, "Failed to write authorization log");
        }
    }
}

fn record_for(
    code: &authorization_code::Model,
    presented: &SecurityContext,
    failure: Option<FailureReason>,
    report: Option<MatchReport>,
) -> AuditRecord {
    AuditRecord {
        code_uuid: Some(code.uuid),
        application_uuid: Some(code.application_uuid),
        user_uuid: Some(code.user_uuid),
        presented: presented.clone(),
        failure,
        report,
    }
}
