//! Shared error type across dockfence crates.

use thiserror::Error;

use crate::reject::RejectReason;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Structurally invalid input (malformed JSON, unknown fields, bad values).
    BadRequest,
    /// Request rejected by the security policy.
    ValidationFailed,
    /// Image is not on the configured allowlist.
    ImageNotAllowed,
    /// Resource does not exist or is not owned by this instance.
    NotFound,
    /// Requested image is not present on the runtime host.
    ImageNotFound,
    /// Runtime reported a state conflict.
    Conflict,
    /// Runtime daemon unreachable or timed out.
    RuntimeUnavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::ValidationFailed => "VALIDATION_FAILED",
            ClientCode::ImageNotAllowed => "IMAGE_NOT_ALLOWED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::ImageNotFound => "IMAGE_NOT_FOUND",
            ClientCode::Conflict => "CONFLICT",
            ClientCode::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(self) -> bool {
        matches!(self, ClientCode::RuntimeUnavailable)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FenceError>;

/// Unified error type used by core and gateway.
///
/// `Display` output for `Conflict` and `Unexpected` is meant for logs; the HTTP
/// layer replaces it with a fixed message so daemon text never reaches callers.
#[derive(Debug, Error)]
pub enum FenceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("security validation failed: {0}")]
    Validation(RejectReason),
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("state conflict: {0}")]
    Conflict(String),
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    #[error("unexpected runtime error: {0}")]
    Unexpected(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FenceError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            FenceError::BadRequest(_) => ClientCode::BadRequest,
            FenceError::Validation(RejectReason::ImageNotAllowlisted(_)) => {
                ClientCode::ImageNotAllowed
            }
            FenceError::Validation(_) => ClientCode::ValidationFailed,
            FenceError::NotFound(_) => ClientCode::NotFound,
            FenceError::ImageNotFound(_) => ClientCode::ImageNotFound,
            FenceError::Conflict(_) => ClientCode::Conflict,
            FenceError::RuntimeUnavailable(_) => ClientCode::RuntimeUnavailable,
            FenceError::Unexpected(_) | FenceError::Config(_) => ClientCode::Internal,
        }
    }
}

impl From<RejectReason> for FenceError {
    fn from(reason: RejectReason) -> Self {
        FenceError::Validation(reason)
    }
}
