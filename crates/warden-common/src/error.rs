use serde::{Deserialize, Serialize};

/// Machine-readable error codes for the wire protocol.
/// Shared by the HTTP service, the enrollment client, and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or out-of-policy input (bad CN, excessive validity, unknown role).
    ValidationFailed,
    /// Provisioner credential rejected.
    AuthRejected,
    /// Too many failed credential attempts.
    RateLimited,
    /// No record for the referenced CN in the expected state.
    NotFound,
    /// Bootstrap fingerprint mismatch — the received root must not be trusted.
    TrustMismatch,
    /// The signing engine could not complete the operation; retryable.
    EngineUnavailable,
    /// Inventory or artifact read/write failure.
    StorageFailure,
    IoError,
}

impl ErrorCode {
    /// Suggested HTTP status code for this error.
    /// Transport-agnostic (returns u16, not an axum type).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed => 400,
            Self::AuthRejected => 401,
            Self::NotFound => 404,
            Self::TrustMismatch => 409,
            Self::RateLimited => 429,
            Self::EngineUnavailable => 503,
            Self::StorageFailure | Self::IoError => 500,
        }
    }
}
