//! Authorization code entity - long-lived, multi-use, context-bound codes.
//!
//! A code is valid while it is active and not yet expired; the usage counter
//! is bookkeeping and never affects validity.

use crate::context::SecurityContext;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authorization_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub user_uuid: Uuid,
    pub application_uuid: Uuid,
    pub user_agent: String,
    pub browser_fingerprint: String,
    pub ip_address: String,
    pub expires_at: OffsetDateTime,
    pub is_active: bool,
    pub usage_count: i32,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserUuid",
        to = "super::user::Column::Uuid"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationUuid",
        to = "super::application::Column::Uuid"
    )]
    Application,
    #[sea_orm(has_many = "super::authorization_log::Entity")]
    AuthorizationLogs,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl Related<super::authorization_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthorizationLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    /// The context the code was issued to.
    pub fn security_context(&self) -> SecurityContext {
        SecurityContext::new(
            self.ip_address.clone(),
            self.user_agent.clone(),
            self.browser_fingerprint.clone(),
        )
    }
}

/// Build a fresh, active, unused code row.
pub fn new_active_model(
    code: String,
    user_uuid: Uuid,
    application_uuid: Uuid,
    context: &SecurityContext,
    now: OffsetDateTime,
    expires_at: OffsetDateTime,
) -> ActiveModel {
    ActiveModel {
        uuid: Set(Uuid::now_v7()),
        code: Set(code),
        user_uuid: Set(user_uuid),
        application_uuid: Set(application_uuid),
        user_agent: Set(context.user_agent.clone()),
        browser_fingerprint: Set(context.browser_fingerprint.clone()),
        ip_address: Set(context.ip_address.clone()),
        expires_at: Set(expires_at),
        is_active: Set(true),
        usage_count: Set(0),
        last_used_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn code(is_active: bool) -> Model {
        Model {
            uuid: Uuid::nil(),
            code: "c".into(),
            user_uuid: Uuid::nil(),
            application_uuid: Uuid::nil(),
            user_agent: "ua".into(),
            browser_fingerprint: "fp".into(),
            ip_address: "192.0.2.1".into(),
            expires_at: datetime!(2025-05-01 12:00 UTC),
            is_active,
            usage_count: 41,
            last_used_at: None,
            created_at: datetime!(2025-05-01 6:00 UTC),
            updated_at: datetime!(2025-05-01 6:00 UTC),
        }
    }

    #[test]
    fn validity_ignores_usage_count() {
        let c = code(true);
        assert!(c.is_valid_at(datetime!(2025-05-01 11:59 UTC)));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let c = code(true);
        assert!(c.is_expired_at(c.expires_at));
        assert!(!c.is_valid_at(c.expires_at));
        assert!(c.is_valid_at(c.expires_at - Duration::seconds(1)));
    }

    #[test]
    fn inactive_code_is_never_valid() {
        assert!(!code(false).is_valid_at(datetime!(2025-05-01 7:00 UTC)));
    }
}
