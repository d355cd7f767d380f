//! Authorization log entity - one immutable row per verification attempt.
//!
//! The code, application and user references are optional: an unknown code
//! resolves to none of them, and rows must outlive the code they describe.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authorization_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub authorization_code_uuid: Option<Uuid>,
    pub application_uuid: Option<Uuid>,
    pub user_uuid: Option<Uuid>,
    pub request_ip_address: String,
    pub request_user_agent: String,
    pub request_browser_fingerprint: String,
    pub is_success: bool,
    /// "code_not_found", "code_revoked", "code_expired", "context_mismatch"
    /// or "storage_error"
    pub failure_reason: Option<String>,
    pub fingerprint_matched: Option<bool>,
    pub user_agent_matched: Option<bool>,
    pub ip_matched: Option<bool>,
    pub verified_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::authorization_code::Entity",
        from = "Column::AuthorizationCodeUuid",
        to = "super::authorization_code::Column::Uuid"
    )]
    AuthorizationCode,
}

impl Related<super::authorization_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthorizationCode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
