//! Error types
//!
//! [`DriveError`] is the closed set of outcomes every drive operation can
//! fail with. [`DomainError`] covers validation failures when constructing
//! domain values.

use thiserror::Error;

/// Boxed cause carried by [`DriveError::General`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a failed authentication, refresh, or drive operation
#[derive(Debug, Error)]
pub enum DriveError {
    /// The user dismissed the external authentication step
    #[error("Authentication cancelled by user")]
    CancelledByUser,

    /// The transport returned no body where one was expected
    #[error("Empty response")]
    EmptyResponse,

    /// A body was present but was not valid structured data or lacked a
    /// required field
    #[error("Misformatted response: {0}")]
    MisformattedResponse(String),

    /// The token is stale and no refresh token is available
    #[error("Cannot refresh token: no refresh token available")]
    CannotRefreshToken,

    /// The provider returned a structured error payload or error description
    #[error("Server error: {0}")]
    ServerSide(String),

    /// Any other failure (network, TLS, internal)
    #[error("General failure: {0}")]
    General(#[source] BoxError),
}

impl DriveError {
    /// Wraps an arbitrary cause as [`DriveError::General`]
    pub fn general(cause: impl Into<BoxError>) -> Self {
        DriveError::General(cause.into())
    }

    /// Shorthand for [`DriveError::MisformattedResponse`]
    pub fn misformatted(detail: impl Into<String>) -> Self {
        DriveError::MisformattedResponse(detail.into())
    }

    /// Shorthand for [`DriveError::ServerSide`]
    pub fn server(message: impl Into<String>) -> Self {
        DriveError::ServerSide(message.into())
    }

    /// Returns true for the user-initiated cancellation outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DriveError::CancelledByUser)
    }

    /// Returns true when the caller must re-run the interactive login
    pub fn requires_login(&self) -> bool {
        matches!(self, DriveError::CannotRefreshToken)
    }
}

/// Result alias for drive operations
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors that can occur while constructing domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),
}
