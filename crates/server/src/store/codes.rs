//! Authorization code storage.
//!
//! Usage accounting and revocation are single-row conditional updates, so
//! concurrent verifications of one code never lose increments and a revoke
//! is observed by every later attempt. Different codes never contend.

use super::Db;
use crate::entity::authorization_code;
use crate::error::PersistenceError;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct CodeStore {
    db: Db,
}

impl CodeStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        code: authorization_code::ActiveModel,
    ) -> Result<authorization_code::Model, PersistenceError> {
        self.db.run(code.insert(self.db.conn())).await
    }

    pub async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<authorization_code::Model>, PersistenceError> {
        self.db
            .read(|| {
                authorization_code::Entity::find()
                    .filter(authorization_code::Column::Code.eq(code))
                    .one(self.db.conn())
            })
            .await
    }

    pub async fn find_by_uuid(
        &self,
        uuid: Uuid,
    ) -> Result<Option<authorization_code::Model>, PersistenceError> {
        self.db
            .read(|| authorization_code::Entity::find_by_id(uuid).one(self.db.conn()))
            .await
    }

    /// Codes of a (user, application) pair, newest first.
    pub async fn list_for_pair(
        &self,
        user_uuid: Uuid,
        application_uuid: Uuid,
    ) -> Result<Vec<authorization_code::Model>, PersistenceError> {
        self.db
            .read(|| {
                authorization_code::Entity::find()
                    .filter(authorization_code::Column::UserUuid.eq(user_uuid))
                    .filter(authorization_code::Column::ApplicationUuid.eq(application_uuid))
                    .order_by_desc(authorization_code::Column::CreatedAt)
                    .all(self.db.conn())
            })
            .await
    }

    /// Count one use of an active code.
    ///
    /// Returns `false` when the row is no longer active, i.e. it was revoked
    /// after the caller read it. The increment happens in the database so
    /// parallel callers cannot overwrite each other.
    pub async fn record_use(&self, uuid: Uuid, now: OffsetDateTime) -> Result<bool, PersistenceError> {
        let result = self
            .db
            .run(
                authorization_code::Entity::update_many()
                    .col_expr(
                        authorization_code::Column::UsageCount,
                        Expr::col(authorization_code::Column::UsageCount).add(1),
                    )
                    .col_expr(authorization_code::Column::LastUsedAt, Expr::value(now))
                    .col_expr(authorization_code::Column::UpdatedAt, Expr::value(now))
                    .filter(authorization_code::Column::Uuid.eq(uuid))
                    .filter(authorization_code::Column::IsActive.eq(true))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Deactivate one code. Returns `false` if it was already inactive.
    pub async fn deactivate(&self, uuid: Uuid, now: OffsetDateTime) -> Result<bool, PersistenceError> {
        let result = self
            .db
            .run(
                authorization_code::Entity::update_many()
                    .col_expr(authorization_code::Column::IsActive, Expr::value(false))
                    .col_expr(authorization_code::Column::UpdatedAt, Expr::value(now))
                    .filter(authorization_code::Column::Uuid.eq(uuid))
                    .filter(authorization_code::Column::IsActive.eq(true))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Deactivate every active code of a (user, application) pair, optionally
    /// sparing one.
    pub async fn deactivate_for_pair(
        &self,
        user_uuid: Uuid,
        application_uuid: Uuid,
        except: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<u64, PersistenceError> {
        let mut update = authorization_code::Entity::update_many()
            .col_expr(authorization_code::Column::IsActive, Expr::value(false))
            .col_expr(authorization_code::Column::UpdatedAt, Expr::value(now))
            .filter(authorization_code::Column::UserUuid.eq(user_uuid))
            .filter(authorization_code::Column::ApplicationUuid.eq(application_uuid))
            .filter(authorization_code::Column::IsActive.eq(true));
        if let Some(keep) = except {
            update = update.filter(authorization_code::Column::Uuid.ne(keep));
        }
        let result = self.db.run(update.exec(self.db.conn())).await?;
        Ok(result.rows_affected)
    }

    /// Deactivate every active code a user holds, across applications.
    pub async fn deactivate_for_user(
        &self,
        user_uuid: Uuid,
        now: OffsetDateTime,
    ) -> Result<u64, PersistenceError> {
        let result = self
            .db
            .run(
                authorization_code::Entity::update_many()
                    .col_expr(authorization_code::Column::IsActive, Expr::value(false))
                    .col_expr(authorization_code::Column::UpdatedAt, Expr::value(now))
                    .filter(authorization_code::Column::UserUuid.eq(user_uuid))
                    .filter(authorization_code::Column::IsActive.eq(true))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected)
    }
}
