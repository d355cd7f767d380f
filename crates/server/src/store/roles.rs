//! Roles and their assignment to users.

use super::Db;
use crate::entity::role::{self, NewRole};
use crate::entity::user_role;
use crate::error::PersistenceError;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct RoleStore {
    db: Db,
}

impl RoleStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<role::Model>, PersistenceError> {
        self.db
            .read(|| {
                role::Entity::find()
                    .filter(role::Column::Name.eq(name))
                    .one(self.db.conn())
            })
            .await
    }

    /// Create the role unless one with the same name exists. The flag is
    /// `true` when a row was created.
    pub async fn ensure(
        &self,
        new: &NewRole,
        now: OffsetDateTime,
    ) -> Result<(role::Model, bool), PersistenceError> {
        if let Some(existing) = self.find_by_name(&new.name).await? {
            return Ok((existing, false));
        }
        let created = self
            .db
            .run(role::new_active_model(new, now).insert(self.db.conn()))
            .await?;
        Ok((created, true))
    }

    async fn find_assignment(
        &self,
        user_uuid: Uuid,
        role_uuid: Uuid,
    ) -> Result<Option<user_role::Model>, PersistenceError> {
        self.db
            .read(|| {
                user_role::Entity::find()
                    .filter(user_role::Column::UserUuid.eq(user_uuid))
                    .filter(user_role::Column::RoleUuid.eq(role_uuid))
                    .one(self.db.conn())
            })
            .await
    }

    /// Grant a role. An existing assignment is reactivated with the new
    /// expiry instead of duplicated.
    pub async fn assign(
        &self,
        user_uuid: Uuid,
        role: &role::Model,
        assigned_by: Option<Uuid>,
        expires_at: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> Result<user_role::Model, PersistenceError> {
        match self.find_assignment(user_uuid, role.uuid).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.is_active = Set(true);
                active.assigned_by = Set(assigned_by);
                active.assigned_at = Set(now);
                active.expires_at = Set(expires_at);
                active.updated_at = Set(now);
                self.db.run(active.update(self.db.conn())).await
            }
            None => {
                let model =
                    user_role::new_active_model(user_uuid, role.uuid, assigned_by, expires_at, now);
                self.db.run(model.insert(self.db.conn())).await
            }
        }
    }

    /// Withdraw a role. Returns `false` if it was not actively assigned.
    pub async fn unassign(
        &self,
        user_uuid: Uuid,
        role: &role::Model,
        now: OffsetDateTime,
    ) -> Result<bool, PersistenceError> {
        let Some(existing) = self.find_assignment(user_uuid, role.uuid).await? else {
            return Ok(false);
        };
        if !existing.is_active {
            return Ok(false);
        }
        let mut active = existing.into_active_model();
        active.is_active = Set(false);
        active.updated_at = Set(now);
        self.db.run(active.update(self.db.conn())).await?;
        Ok(true)
    }

    /// Roles currently in effect for a user, by name.
    pub async fn roles_for_user(
        &self,
        user_uuid: Uuid,
        now: OffsetDateTime,
    ) -> Result<Vec<role::Model>, PersistenceError> {
        let assignments = self
            .db
            .read(|| {
                user_role::Entity::find()
                    .filter(user_role::Column::UserUuid.eq(user_uuid))
                    .filter(user_role::Column::IsActive.eq(true))
                    .find_also_related(role::Entity)
                    .all(self.db.conn())
            })
            .await?;
        let mut roles: Vec<role::Model> = assignments
            .into_iter()
            .filter(|(assignment, _)| assignment.is_effective_at(now))
            .filter_map(|(_, role)| role)
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}
