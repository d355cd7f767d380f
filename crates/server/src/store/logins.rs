//! Password login attempts.

use super::Db;
use crate::context::SecurityContext;
use crate::entity::login_log;
use crate::error::PersistenceError;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use time::OffsetDateTime;
use uuid::Uuid;

pub const PASSWORD_LOGIN: &str = "password";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginFailure {
    UserNotFound,
    UserInactive,
    InvalidPassword,
}

impl LoginFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::UserNotFound => "user_not_found",
            LoginFailure::UserInactive => "user_inactive",
            LoginFailure::InvalidPassword => "invalid_password",
        }
    }
}

/// One login attempt, before it is written.
#[derive(Clone, Debug)]
pub struct LoginAttempt {
    pub user_uuid: Option<Uuid>,
    pub context: SecurityContext,
    pub failure: Option<LoginFailure>,
}

impl LoginAttempt {
    pub fn into_active_model(self, now: OffsetDateTime) -> login_log::ActiveModel {
        let fingerprint = Some(self.context.browser_fingerprint).filter(|fp| !fp.is_empty());
        login_log::ActiveModel {
            uuid: Set(Uuid::now_v7()),
            user_uuid: Set(self.user_uuid),
            login_type: Set(PASSWORD_LOGIN.to_string()),
            ip_address: Set(self.context.ip_address),
            user_agent: Set(self.context.user_agent),
            browser_fingerprint: Set(fingerprint),
            is_success: Set(self.failure.is_none()),
            failure_reason: Set(self.failure.map(|f| f.as_str().to_string())),
            login_at: Set(now),
            created_at: Set(now),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoginLog {
    db: Db,
}

impl LoginLog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn append(
        &self,
        attempt: LoginAttempt,
        now: OffsetDateTime,
    ) -> Result<login_log::Model, PersistenceError> {
        self.db
            .run(attempt.into_active_model(now).insert(self.db.conn()))
            .await
    }

    /// A user's most recent login attempts, newest first.
    pub async fn history_for_user(
        &self,
        user_uuid: Uuid,
        limit: u64,
    ) -> Result<Vec<login_log::Model>, PersistenceError> {
        self.db
            .read(|| {
                login_log::Entity::find()
                    .filter(login_log::Column::UserUuid.eq(user_uuid))
                    .order_by_desc(login_log::Column::LoginAt)
                    .order_by_desc(login_log::Column::Uuid)
                    .limit(limit)
                    .all(self.db.conn())
            })
            .await
    }

    /// Most recent failed attempts across all users, newest first.
    pub async fn recent_failures(
        &self,
        limit: u64,
    ) -> Result<Vec<login_log::Model>, PersistenceError> {
        self.db
            .read(|| {
                login_log::Entity::find()
                    .filter(login_log::Column::IsSuccess.eq(false))
                    .order_by_desc(login_log::Column::LoginAt)
                    .order_by_desc(login_log::Column::Uuid)
                    .limit(limit)
                    .all(self.db.conn())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn unknown_user_attempt_has_no_reference() {
        let attempt = LoginAttempt {
            user_uuid: None,
            context: SecurityContext::new("192.0.2.9", "ua", "fp"),
            failure: Some(LoginFailure::UserNotFound),
        };
        let model = attempt.into_active_model(datetime!(2025-06-01 0:00 UTC));
        assert_eq!(model.user_uuid.clone().unwrap(), None);
        assert_eq!(model.is_success.clone().unwrap(), false);
        assert_eq!(
            model.failure_reason.clone().unwrap(),
            Some("user_not_found".to_string())
        );
        assert_eq!(model.login_type.clone().unwrap(), "password");
    }

    #[test]
    fn empty_fingerprint_is_stored_as_absent() {
        let attempt = LoginAttempt {
            user_uuid: Some(Uuid::nil()),
            context: SecurityContext::new("192.0.2.9", "ua", ""),
            failure: None,
        };
        let model = attempt.into_active_model(datetime!(2025-06-01 0:00 UTC));
        assert_eq!(model.browser_fingerprint.clone().unwrap(), None);
        assert_eq!(model.failure_reason.clone().unwrap(), None);
    }
}
