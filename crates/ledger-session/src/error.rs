//! Session error types.

use thiserror::Error;

/// Error type for session, request and restore operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport-level failure (connection refused, timeout, unreadable body)
    #[error("Network error: {0}")]
    NetworkFailure(String),

    /// 401 that could not be recovered by refreshing the access token
    #[error("Session expired, please log in again")]
    AuthExpired,

    /// 403
    #[error("Permission denied")]
    PermissionDenied,

    /// 404
    #[error("The requested resource does not exist")]
    NotFound,

    /// 5xx
    #[error("Internal server error (HTTP {0})")]
    ServerFailure(u16),

    /// Response payload carried an explicit `error` or `detail` field
    #[error("{0}")]
    MalformedResponse(String),

    /// Stored session data could not be parsed
    #[error("Persisted state is corrupt: {0}")]
    PersistedStateCorrupt(String),

    /// Login response without a usable access token
    #[error("Invalid login response: {0}")]
    InvalidResponse(String),

    /// Refresh requested without a refresh token
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Any other non-success status
    #[error("Request failed with status {status}")]
    RequestFailed { status: u16 },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] ledger_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SessionError {
    /// Map a non-success HTTP status to its error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => SessionError::AuthExpired,
            403 => SessionError::PermissionDenied,
            404 => SessionError::NotFound,
            s if s >= 500 => SessionError::ServerFailure(s),
            s => SessionError::RequestFailed { status: s },
        }
    }

    /// The single message shown to the user for this error.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::PermissionDenied => "Permission denied".to_string(),
            SessionError::NotFound => "The requested resource does not exist".to_string(),
            SessionError::ServerFailure(_) => "Internal server error".to_string(),
            SessionError::NetworkFailure(message) if message.trim().is_empty() => {
                "Network error".to_string()
            }
            SessionError::NetworkFailure(message) => message.clone(),
            SessionError::MalformedResponse(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the failure is transient and a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::NetworkFailure(_) | SessionError::ServerFailure(_)
        )
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(matches!(SessionError::from_status(401), SessionError::AuthExpired));
        assert!(matches!(SessionError::from_status(403), SessionError::PermissionDenied));
        assert!(matches!(SessionError::from_status(404), SessionError::NotFound));
        assert!(matches!(SessionError::from_status(502), SessionError::ServerFailure(502)));
        assert!(matches!(
            SessionError::from_status(409),
            SessionError::RequestFailed { status: 409 }
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(SessionError::PermissionDenied.user_message(), "Permission denied");
        assert_eq!(
            SessionError::NotFound.user_message(),
            "The requested resource does not exist"
        );
        assert_eq!(SessionError::ServerFailure(503).user_message(), "Internal server error");
        assert_eq!(
            SessionError::NetworkFailure(String::new()).user_message(),
            "Network error"
        );
        assert_eq!(
            SessionError::MalformedResponse("Project name taken".into()).user_message(),
            "Project name taken"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(SessionError::NetworkFailure("timeout".into()).is_transient());
        assert!(SessionError::ServerFailure(500).is_transient());
        assert!(!SessionError::AuthExpired.is_transient());
        assert!(!SessionError::PermissionDenied.is_transient());
        assert!(!SessionError::MalformedResponse("x".into()).is_transient());
    }
}
