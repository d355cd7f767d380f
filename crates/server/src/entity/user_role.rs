//! User role entity - assignment of a role to a user, optionally time-limited.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    pub user_uuid: Uuid,
    pub role_uuid: Uuid,
    /// The user who granted the role, if any.
    pub assigned_by: Option<Uuid>,
    pub assigned_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
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
        belongs_to = "super::role::Entity",
        from = "Column::RoleUuid",
        to = "super::role::Column::Uuid"
    )]
    Role,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_effective_at(&self, now: OffsetDateTime) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

pub fn new_active_model(
    user_uuid: Uuid,
    role_uuid: Uuid,
    assigned_by: Option<Uuid>,
    expires_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> ActiveModel {
    ActiveModel {
        uuid: Set(Uuid::now_v7()),
        user_uuid: Set(user_uuid),
        role_uuid: Set(role_uuid),
        assigned_by: Set(assigned_by),
        assigned_at: Set(now),
        expires_at: Set(expires_at),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
