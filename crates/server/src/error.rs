use crate::context::MatchReport;
use std::time::Duration;
use thiserror::Error;

/// Storage-layer failures. Never shown to callers verbatim.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Failed to hash credential: {0}")]
    Credential(String),
    /// The task running the operation was cancelled by the runtime.
    #[error("Storage operation interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Error)]
pub enum SsoError {
    /// Missing user, application, code or token. Does not say which one.
    #[error("Not found")]
    NotFound,
    #[error("Authorization code expired")]
    Expired,
    #[error("Authorization code revoked")]
    Revoked,
    /// Carries the per-factor report for logging only.
    #[error("Security context mismatch ({0})")]
    ContextMismatch(MatchReport),
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<sea_orm::DbErr> for SsoError {
    fn from(err: sea_orm::DbErr) -> Self {
        SsoError::Persistence(PersistenceError::Database(err))
    }
}

/// The small enumerated reason set callers are allowed to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicReason {
    NotFound,
    CodeExpired,
    CodeRevoked,
    ContextMismatch,
    InvalidToken,
    InvalidRequest,
    ServerError,
}

impl PublicReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicReason::NotFound => "not_found",
            PublicReason::CodeExpired => "code_expired",
            PublicReason::CodeRevoked => "code_revoked",
            PublicReason::ContextMismatch => "context_mismatch",
            PublicReason::InvalidToken => "invalid_token",
            PublicReason::InvalidRequest => "invalid_request",
            PublicReason::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for PublicReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SsoError {
    pub fn public_reason(&self) -> PublicReason {
        match self {
            SsoError::NotFound => PublicReason::NotFound,
            SsoError::Expired => PublicReason::CodeExpired,
            SsoError::Revoked => PublicReason::CodeRevoked,
            SsoError::ContextMismatch(_) => PublicReason::ContextMismatch,
            SsoError::InvalidToken => PublicReason::InvalidToken,
            SsoError::InvalidInput(_) => PublicReason::InvalidRequest,
            SsoError::Persistence(_) => PublicReason::ServerError,
        }
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, SsoError::Persistence(_))
    }
}

pub type SsoResult<T> = Result<T, SsoError>;
