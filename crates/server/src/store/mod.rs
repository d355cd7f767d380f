//! Persistence for codes, audit rows, tokens, roles and the user/application
//! directory.
//!
//! Every call goes through [`Db`], which bounds it with the configured timeout
//! and maps failures to [`PersistenceError`]. Idempotent reads may be retried
//! once; mutations never are.

pub mod audit;
pub mod codes;
pub mod directory;
pub mod logins;
pub mod roles;
pub mod tokens;

pub use audit::{AuditLog, AuditRecord, FailureReason};
pub use codes::CodeStore;
pub use directory::{Directory, RegisteredApplication};
pub use logins::{LoginAttempt, LoginFailure, LoginLog};
pub use roles::RoleStore;
pub use tokens::TokenStore;

use crate::error::PersistenceError;
use sea_orm::{DatabaseConnection, DbErr};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Shared database handle with a per-call deadline.
#[derive(Clone, Debug)]
pub struct Db {
    conn: Arc<DatabaseConnection>,
    timeout: Duration,
}

impl Db {
    pub fn new(conn: Arc<DatabaseConnection>, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    pub fn conn(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a single storage operation under the deadline.
    pub async fn run<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(PersistenceError::from),
            Err(_) => Err(PersistenceError::Timeout(self.timeout)),
        }
    }

    /// Run an idempotent read, retrying it once if the first attempt fails.
    pub async fn read<T, F, Fut>(&self, mut op: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        match self.run(op()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "storage read failed, retrying once");
                self.run(op()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PublicReason, SsoError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn db(timeout: Duration) -> Db {
        let conn = sea_orm::Database::connect("sqlite::memory:")
            .await
            .expect("connect");
        Db::new(Arc::new(conn), timeout)
    }

    #[tokio::test]
    async fn run_gives_up_at_the_deadline() {
        let db = db(Duration::from_millis(10)).await;
        let err = db
            .run(std::future::pending::<Result<(), DbErr>>())
            .await
            .expect_err("a call that never completes must time out");
        assert!(matches!(err, PersistenceError::Timeout(d) if d == Duration::from_millis(10)));

        let err = SsoError::from(err);
        assert_eq!(err.public_reason(), PublicReason::ServerError);
    }

    #[tokio::test]
    async fn read_retries_once_after_a_failure() {
        let db = db(Duration::from_secs(1)).await;
        let calls = AtomicUsize::new(0);
        let value = db
            .read(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(DbErr::Custom("connection reset".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .expect("second attempt succeeds");
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_retries_a_timed_out_attempt() {
        let db = db(Duration::from_millis(10)).await;
        let calls = AtomicUsize::new(0);
        let value = db
            .read(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        std::future::pending::<()>().await;
                    }
                    Ok::<_, DbErr>("row")
                }
            })
            .await
            .expect("retry after timeout");
        assert_eq!(value, "row");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_stops_after_the_second_failure() {
        let db = db(Duration::from_secs(1)).await;
        let calls = AtomicUsize::new(0);
        let err = db
            .read(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbErr::Custom("database is locked".into())) }
            })
            .await
            .expect_err("two failures surface");
        assert!(matches!(err, PersistenceError::Database(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
