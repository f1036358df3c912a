//! CA domain error types.

use warden_common::error::ErrorCode;
use warden_crypto::provisioner::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum CaError {
    /// Input violated a policy; the message names the constraint.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("provisioner credential rejected")]
    Auth,

    #[error("too many failed credential attempts — try again in {remaining_secs} seconds")]
    RateLimited { remaining_secs: u64 },

    #[error("no active certificate for {0}")]
    NotFound(String),

    #[error("signing engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AuthError> for CaError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Rejected => Self::Auth,
            AuthError::LockedOut { remaining_secs } => Self::RateLimited { remaining_secs },
        }
    }
}

impl From<&CaError> for ErrorCode {
    fn from(e: &CaError) -> Self {
        match e {
            CaError::Validation(_) => ErrorCode::ValidationFailed,
            CaError::Auth => ErrorCode::AuthRejected,
            CaError::RateLimited { .. } => ErrorCode::RateLimited,
            CaError::NotFound(_) => ErrorCode::NotFound,
            CaError::EngineUnavailable(_) => ErrorCode::EngineUnavailable,
            CaError::Storage(_) => ErrorCode::StorageFailure,
            CaError::Io(_) => ErrorCode::IoError,
        }
    }
}
