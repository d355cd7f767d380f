//! Users and applications: the aggregate roots codes and tokens hang off.

use super::Db;
use super::logins::{LoginAttempt, LoginFailure, LoginLog};
use crate::context::SecurityContext;
use crate::credentials::{TokenGenerator, hash_password, verify_password};
use crate::entity::application::{self, NewApplication};
use crate::entity::user;
use crate::error::PersistenceError;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter};
use time::OffsetDateTime;
use uuid::Uuid;

/// A freshly registered application together with its plain secret.
///
/// Only the Argon2 hash of the secret is stored; this is the one chance to
/// hand the plain value to the operator.
#[derive(Debug, Clone)]
pub struct RegisteredApplication {
    pub application: application::Model,
    pub application_secret: String,
}

#[derive(Clone, Debug)]
pub struct Directory {
    db: Db,
    logins: LoginLog,
}

impl Directory {
    pub fn new(db: Db) -> Self {
        Self {
            logins: LoginLog::new(db.clone()),
            db,
        }
    }

    pub fn logins(&self) -> &LoginLog {
        &self.logins
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        phone: Option<&str>,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<user::Model, PersistenceError> {
        let password_hash = hash_password(password)?;
        let model = user::new_active_model(username, email, phone, password_hash, now);
        self.db.run(model.insert(self.db.conn())).await
    }

    pub async fn find_user(&self, uuid: Uuid) -> Result<Option<user::Model>, PersistenceError> {
        self.db
            .read(|| user::Entity::find_by_id(uuid).one(self.db.conn()))
            .await
    }

    pub async fn find_active_user(
        &self,
        uuid: Uuid,
    ) -> Result<Option<user::Model>, PersistenceError> {
        Ok(self.find_user(uuid).await?.filter(|u| u.is_active))
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, PersistenceError> {
        self.db
            .read(|| {
                user::Entity::find()
                    .filter(user::Column::Username.eq(username))
                    .one(self.db.conn())
            })
            .await
    }

    /// Check a username/password pair and stamp `last_login_at` on success.
    ///
    /// Unknown users, inactive users and wrong passwords all yield `None`.
    /// Every attempt is written to the login log with the caller's context.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        context: &SecurityContext,
        now: OffsetDateTime,
    ) -> Result<Option<user::Model>, PersistenceError> {
        let found = self.find_user_by_username(username).await?;
        let failure = match &found {
            None => Some(LoginFailure::UserNotFound),
            Some(u) if !u.is_active => Some(LoginFailure::UserInactive),
            Some(u) if !verify_password(password, &u.password_hash) => {
                Some(LoginFailure::InvalidPassword)
            }
            Some(_) => None,
        };
        let attempt = LoginAttempt {
            user_uuid: found.as_ref().map(|u| u.uuid),
            context: context.clone(),
            failure,
        };
        if let Err(e) = self.logins.append(attempt, now).await {
            tracing::error!(error = %e, "Failed to write login log");
        }
        match (found, failure) {
            (Some(found), None) => self.record_login(found, now).await.map(Some),
            (_, Some(failure)) => {
                tracing::info!(reason = failure.as_str(), "Password login rejected");
                Ok(None)
            }
            (None, None) => Ok(None),
        }
    }

    pub async fn record_login(
        &self,
        found: user::Model,
        now: OffsetDateTime,
    ) -> Result<user::Model, PersistenceError> {
        let mut active = found.into_active_model();
        active.last_login_at = Set(Some(now));
        active.updated_at = Set(now);
        self.db.run(active.update(self.db.conn())).await
    }

    /// Soft-delete a user. Returns `false` if the user was unknown or already
    /// inactive.
    pub async fn set_user_inactive(
        &self,
        uuid: Uuid,
        now: OffsetDateTime,
    ) -> Result<bool, PersistenceError> {
        let Some(found) = self.find_user(uuid).await? else {
            return Ok(false);
        };
        if !found.is_active {
            return Ok(false);
        }
        let mut active = found.into_active_model();
        active.is_active = Set(false);
        active.updated_at = Set(now);
        self.db.run(active.update(self.db.conn())).await?;
        Ok(true)
    }

    pub async fn create_application(
        &self,
        new: &NewApplication,
        generator: &dyn TokenGenerator,
        now: OffsetDateTime,
    ) -> Result<RegisteredApplication, PersistenceError> {
        let application_secret = generator.generate();
        let secret_hash = hash_password(&application_secret)?;
        let model = application::new_active_model(new, secret_hash, now);
        let application = self.db.run(model.insert(self.db.conn())).await?;
        Ok(RegisteredApplication {
            application,
            application_secret,
        })
    }

    pub async fn find_application_by_id(
        &self,
        application_id: &str,
    ) -> Result<Option<application::Model>, PersistenceError> {
        self.db
            .read(|| {
                application::Entity::find()
                    .filter(application::Column::ApplicationId.eq(application_id))
                    .one(self.db.conn())
            })
            .await
    }

    pub async fn find_active_application(
        &self,
        application_id: &str,
    ) -> Result<Option<application::Model>, PersistenceError> {
        Ok(self
            .find_application_by_id(application_id)
            .await?
            .filter(|a| a.is_active))
    }

    /// Check a client's credentials. Inactive applications never verify.
    pub async fn verify_application_secret(
        &self,
        application_id: &str,
        secret: &str,
    ) -> Result<Option<application::Model>, PersistenceError> {
        Ok(self
            .find_active_application(application_id)
            .await?
            .filter(|a| verify_password(secret, &a.application_secret)))
    }

    /// Create the application unless one with the same public id exists.
    ///
    /// Returns the plain secret only when a row was created.
    pub async fn ensure_application(
        &self,
        new: &NewApplication,
        generator: &dyn TokenGenerator,
        now: OffsetDateTime,
    ) -> Result<(application::Model, Option<String>), PersistenceError> {
        if let Some(existing) = self.find_application_by_id(&new.application_id).await? {
            return Ok((existing, None));
        }
        let registered = self.create_application(new, generator, now).await?;
        Ok((registered.application, Some(registered.application_secret)))
    }
}
