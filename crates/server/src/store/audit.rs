//! Append-only verification audit trail.

use super::Db;
use crate::context::{MatchReport, SecurityContext};
use crate::entity::authorization_log;
use crate::error::PersistenceError;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use time::OffsetDateTime;
use uuid::Uuid;

/// Why a verification attempt failed, as stored in `failure_reason`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    CodeNotFound,
    CodeRevoked,
    CodeExpired,
    ContextMismatch,
    /// The code resolved but its use could not be recorded.
    StorageError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::CodeNotFound => "code_not_found",
            FailureReason::CodeRevoked => "code_revoked",
            FailureReason::CodeExpired => "code_expired",
            FailureReason::ContextMismatch => "context_mismatch",
            FailureReason::StorageError => "storage_error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verification attempt, before it is written.
#[derive(Clone, Debug)]
pub struct AuditRecord {
    pub code_uuid: Option<Uuid>,
    pub application_uuid: Option<Uuid>,
    pub user_uuid: Option<Uuid>,
    pub presented: SecurityContext,
    pub failure: Option<FailureReason>,
    pub report: Option<MatchReport>,
}

impl AuditRecord {
    /// An attempt whose code value did not resolve to any row.
    pub fn lookup_miss(presented: SecurityContext) -> Self {
        Self {
            code_uuid: None,
            application_uuid: None,
            user_uuid: None,
            presented,
            failure: Some(FailureReason::CodeNotFound),
            report: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_active_model(self, now: OffsetDateTime) -> authorization_log::ActiveModel {
        authorization_log::ActiveModel {
            uuid: Set(Uuid::now_v7()),
            authorization_code_uuid: Set(self.code_uuid),
            application_uuid: Set(self.application_uuid),
            user_uuid: Set(self.user_uuid),
            request_ip_address: Set(self.presented.ip_address),
            request_user_agent: Set(self.presented.user_agent),
            request_browser_fingerprint: Set(self.presented.browser_fingerprint),
            is_success: Set(self.failure.is_none()),
            failure_reason: Set(self.failure.map(|f| f.as_str().to_string())),
            fingerprint_matched: Set(self.report.map(|r| r.fingerprint_matched)),
            user_agent_matched: Set(self.report.map(|r| r.user_agent_matched)),
            ip_matched: Set(self.report.map(|r| r.ip_matched)),
            verified_at: Set(now),
            created_at: Set(now),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLog {
    db: Db,
}

impl AuditLog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn append(
        &self,
        record: AuditRecord,
        now: OffsetDateTime,
    ) -> Result<authorization_log::Model, PersistenceError> {
        self.db
            .run(record.into_active_model(now).insert(self.db.conn()))
            .await
    }

    /// Every attempt against one code, oldest first.
    pub async fn history_for_code(
        &self,
        code_uuid: Uuid,
    ) -> Result<Vec<authorization_log::Model>, PersistenceError> {
        self.db
            .read(|| {
                authorization_log::Entity::find()
                    .filter(authorization_log::Column::AuthorizationCodeUuid.eq(code_uuid))
                    .order_by_asc(authorization_log::Column::VerifiedAt)
                    .order_by_asc(authorization_log::Column::Uuid)
                    .all(self.db.conn())
            })
            .await
    }

    /// Most recent failed attempts against an application's codes.
    pub async fn recent_failures_for_application(
        &self,
        application_uuid: Uuid,
        limit: u64,
    ) -> Result<Vec<authorization_log::Model>, PersistenceError> {
        self.db
            .read(|| {
                authorization_log::Entity::find()
                    .filter(authorization_log::Column::ApplicationUuid.eq(application_uuid))
                    .filter(authorization_log::Column::IsSuccess.eq(false))
                    .order_by_desc(authorization_log::Column::VerifiedAt)
                    .limit(limit)
                    .all(self.db.conn())
            })
            .await
    }

    /// Most recent attempts with codes that never existed (guessing/enumeration).
    pub async fn recent_lookup_misses(
        &self,
        limit: u64,
    ) -> Result<Vec<authorization_log::Model>, PersistenceError> {
        self.db
            .read(|| {
                authorization_log::Entity::find()
                    .filter(authorization_log::Column::AuthorizationCodeUuid.is_null())
                    .filter(
                        authorization_log::Column::FailureReason
                            .eq(FailureReason::CodeNotFound.as_str()),
                    )
                    .order_by_desc(authorization_log::Column::VerifiedAt)
                    .limit(limit)
                    .all(self.db.conn())
            })
            .await
    }
}
