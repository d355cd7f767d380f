//! Role entity - a named grant users can be assigned.

use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_role::Entity")]
    UserRoles,
}

impl Related<super::user_role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserRoles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A role as listed under `roles:` in the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub fn new_active_model(new: &NewRole, now: OffsetDateTime) -> ActiveModel {
    ActiveModel {
        uuid: Set(Uuid::now_v7()),
        name: Set(new.name.clone()),
        display_name: Set(new.display_name.clone()),
        description: Set(new.description.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
