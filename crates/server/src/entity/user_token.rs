//! User token entity - an access/refresh pair minted from a verified code.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub user_uuid: Uuid,
    #[sea_orm(unique)]
    pub access_token: String,
    #[sea_orm(unique)]
    pub refresh_token: String,
    pub access_token_expires_at: OffsetDateTime,
    pub refresh_token_expires_at: OffsetDateTime,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_revoked: bool,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Check if the access token has expired or the record was revoked
    pub fn is_access_token_expired_at(&self, now: OffsetDateTime) -> bool {
        self.is_revoked || now >= self.access_token_expires_at
    }

    /// Check if the refresh token has expired or the record was revoked
    pub fn is_refresh_token_expired_at(&self, now: OffsetDateTime) -> bool {
        self.is_revoked || now >= self.refresh_token_expires_at
    }

    /// A record stays valid (refreshable) after its access token expired.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        !self.is_revoked && !self.is_refresh_token_expired_at(now)
    }
}

/// Device metadata recorded with a token pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub fn new_active_model(
    user_uuid: Uuid,
    access_token: String,
    refresh_token: String,
    device: &DeviceMeta,
    now: OffsetDateTime,
    access_token_expires_at: OffsetDateTime,
    refresh_token_expires_at: OffsetDateTime,
) -> ActiveModel {
    ActiveModel {
        uuid: Set(Uuid::now_v7()),
        user_uuid: Set(user_uuid),
        access_token: Set(access_token),
        refresh_token: Set(refresh_token),
        access_token_expires_at: Set(access_token_expires_at),
        refresh_token_expires_at: Set(refresh_token_expires_at),
        device_info: Set(device.device_info.clone()),
        ip_address: Set(device.ip_address.clone()),
        user_agent: Set(device.user_agent.clone()),
        is_revoked: Set(false),
        last_used_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn token(is_revoked: bool) -> Model {
        Model {
            uuid: Uuid::nil(),
            user_uuid: Uuid::nil(),
            access_token: "a".into(),
            refresh_token: "r".into(),
            access_token_expires_at: datetime!(2025-05-01 12:15 UTC),
            refresh_token_expires_at: datetime!(2025-05-15 12:00 UTC),
            device_info: None,
            ip_address: None,
            user_agent: None,
            is_revoked,
            last_used_at: None,
            created_at: datetime!(2025-05-01 12:00 UTC),
            updated_at: datetime!(2025-05-01 12:00 UTC),
        }
    }

    #[test]
    fn expired_access_token_keeps_record_valid() {
        let t = token(false);
        let later = datetime!(2025-05-02 0:00 UTC);
        assert!(t.is_access_token_expired_at(later));
        assert!(t.is_valid_at(later));
    }

    #[test]
    fn refresh_expiry_invalidates_record() {
        assert!(!token(false).is_valid_at(datetime!(2025-05-15 12:00 UTC)));
    }

    #[test]
    fn revoked_record_is_invalid_immediately() {
        let t = token(true);
        let now = datetime!(2025-05-01 12:01 UTC);
        assert!(!t.is_valid_at(now));
        assert!(t.is_access_token_expired_at(now));
    }
}
