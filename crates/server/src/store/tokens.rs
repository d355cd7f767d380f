//! Access/refresh token pair storage.

use super::Db;
use crate::entity::{user, user_token};
use crate::error::PersistenceError;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct TokenStore {
    db: Db,
}

impl TokenStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        token: user_token::ActiveModel,
    ) -> Result<user_token::Model, PersistenceError> {
        self.db.run(token.insert(self.db.conn())).await
    }

    pub async fn find_by_uuid(
        &self,
        uuid: Uuid,
    ) -> Result<Option<user_token::Model>, PersistenceError> {
        self.db
            .read(|| user_token::Entity::find_by_id(uuid).one(self.db.conn()))
            .await
    }

    pub async fn find_by_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<Option<user_token::Model>, PersistenceError> {
        self.db
            .read(|| {
                user_token::Entity::find()
                    .filter(user_token::Column::RefreshToken.eq(refresh_token))
                    .one(self.db.conn())
            })
            .await
    }

    pub async fn find_by_access(
        &self,
        access_token: &str,
    ) -> Result<Option<user_token::Model>, PersistenceError> {
        self.db
            .read(|| {
                user_token::Entity::find()
                    .filter(user_token::Column::AccessToken.eq(access_token))
                    .one(self.db.conn())
            })
            .await
    }

    /// Revoke `old` and insert `replacement` atomically.
    ///
    /// Returns `None` without inserting anything when `old` was already
    /// revoked, which is how the losing side of two concurrent refreshes of
    /// the same token finds out.
    pub async fn rotate(
        &self,
        old: Uuid,
        replacement: user_token::ActiveModel,
        now: OffsetDateTime,
    ) -> Result<Option<user_token::Model>, PersistenceError> {
        let conn = self.db.conn();
        self.db
            .run(async move {
                let txn = conn.begin().await?;
                let revoked = user_token::Entity::update_many()
                    .col_expr(user_token::Column::IsRevoked, Expr::value(true))
                    .col_expr(user_token::Column::UpdatedAt, Expr::value(now))
                    .filter(user_token::Column::Uuid.eq(old))
                    .filter(user_token::Column::IsRevoked.eq(false))
                    .exec(&txn)
                    .await?;
                if revoked.rows_affected != 1 {
                    txn.rollback().await?;
                    return Ok(None);
                }
                let inserted = replacement.insert(&txn).await?;
                txn.commit().await?;
                Ok::<_, DbErr>(Some(inserted))
            })
            .await
    }

    /// Returns `false` if the token was already revoked.
    pub async fn revoke(&self, uuid: Uuid, now: OffsetDateTime) -> Result<bool, PersistenceError> {
        let result = self
            .db
            .run(
                user_token::Entity::update_many()
                    .col_expr(user_token::Column::IsRevoked, Expr::value(true))
                    .col_expr(user_token::Column::UpdatedAt, Expr::value(now))
                    .filter(user_token::Column::Uuid.eq(uuid))
                    .filter(user_token::Column::IsRevoked.eq(false))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn revoke_all_for_user(
        &self,
        user_uuid: Uuid,
        now: OffsetDateTime,
    ) -> Result<u64, PersistenceError> {
        let result = self
            .db
            .run(
                user_token::Entity::update_many()
                    .col_expr(user_token::Column::IsRevoked, Expr::value(true))
                    .col_expr(user_token::Column::UpdatedAt, Expr::value(now))
                    .filter(user_token::Column::UserUuid.eq(user_uuid))
                    .filter(user_token::Column::IsRevoked.eq(false))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected)
    }

    /// Stamp `last_used_at` on a token that is still unrevoked.
    pub async fn touch(&self, uuid: Uuid, now: OffsetDateTime) -> Result<bool, PersistenceError> {
        let result = self
            .db
            .run(
                user_token::Entity::update_many()
                    .col_expr(user_token::Column::LastUsedAt, Expr::value(now))
                    .filter(user_token::Column::Uuid.eq(uuid))
                    .filter(user_token::Column::IsRevoked.eq(false))
                    .exec(self.db.conn()),
            )
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Token records of a user that can still be refreshed, newest first.
    pub async fn active_for_user(
        &self,
        user: &user::Model,
        now: OffsetDateTime,
    ) -> Result<Vec<user_token::Model>, PersistenceError> {
        let tokens = self
            .db
            .read(|| {
                user.find_related(user_token::Entity)
                    .filter(user_token::Column::IsRevoked.eq(false))
                    .order_by_desc(user_token::Column::CreatedAt)
                    .all(self.db.conn())
            })
            .await?;
        Ok(tokens.into_iter().filter(|t| t.is_valid_at(now)).collect())
    }
}
