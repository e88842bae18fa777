//! Error types for the Secret Safe authentication client.

use thiserror::Error;

/// Result type alias for the authentication client.
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

/// Main error type for the authentication client.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Token-related errors
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Session-related errors
    #[error("Session error: {0}")]
    Session(String),
}

impl AuthError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Whether the backend authoritatively rejected the credential (401-class).
    ///
    /// Rejections clear local token state; everything else leaves it intact.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_auth_rejection())
    }

    /// Whether the error is transient (timeout, 5xx, network).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_transient())
    }
}

/// Token-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is malformed: {message}")]
    Malformed { message: String },

    #[error("Token has expired")]
    Expired,

    #[error("No refresh token available")]
    MissingRefreshToken,
}

impl TokenError {
    /// Create a malformed-token error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Storage-specific errors
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Storage backend '{backend}' unavailable: {message}")]
    Unavailable { backend: String, message: String },

    #[error("Write to backend '{backend}' failed: {message}")]
    WriteFailed { backend: String, message: String },

    #[error("All storage backends failed: {message}")]
    AllBackendsFailed { message: String },
}

impl StorageError {
    /// Create an unavailable-backend error.
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a failed-write error.
    pub fn write_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an all-backends-failed error.
    pub fn all_backends_failed(message: impl Into<String>) -> Self {
        Self::AllBackendsFailed {
            message: message.into(),
        }
    }
}

/// Backend API errors.
///
/// The distinction between [`ApiError::Unauthorized`] and everything else is
/// load-bearing: a 401 means the server rejected the credential and local
/// tokens must be cleared, while transient failures must never log the user
/// out.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Response decoding failed: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a status error from a non-success response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether this is a 401-class rejection of the presented credential.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether this failure is transient and must not invalidate tokens.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network { .. } | Self::Decode { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::decode(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_rejection_not_transient() {
        let err = ApiError::unauthorized("invalid credentials");
        assert!(err.is_auth_rejection());
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(ApiError::status(500, "boom").is_transient());
        assert!(ApiError::status(503, "unavailable").is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::network("connection refused").is_transient());
    }

    #[test]
    fn client_errors_are_neither() {
        let err = ApiError::status(422, "validation failed");
        assert!(!err.is_auth_rejection());
        assert!(!err.is_transient());
    }

    #[test]
    fn auth_error_delegates_classification() {
        let err = AuthError::from(ApiError::unauthorized("expired"));
        assert!(err.is_auth_rejection());
        let err = AuthError::from(ApiError::Timeout);
        assert!(err.is_transient());
    }
}
