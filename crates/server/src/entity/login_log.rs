//! Login log entity - one immutable row per password login attempt.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "login_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    /// Empty when the username did not resolve.
    pub user_uuid: Option<Uuid>,
    /// Always "password" for now.
    pub login_type: String,
    pub ip_address: String,
    pub user_agent: String,
    pub browser_fingerprint: Option<String>,
    pub is_success: bool,
    /// "user_not_found", "user_inactive" or "invalid_password"
    pub failure_reason: Option<String>,
    pub login_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
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
