use reqwest::StatusCode;
use shared::validation::ValidationErrors;
use thiserror::Error;

/// Failure of a single API request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("request failed with {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Http {
        status: StatusCode,
        detail: Option<String>,
    },

    /// The request never produced a response (connection, TLS, deadline).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// The request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The configured base URL cannot carry request paths.
    #[error("invalid API URL {0}")]
    InvalidUrl(String),

    #[error("invalid request header {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(err) if err.is_timeout())
    }

    /// Server-provided detail, when there is one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Failure of a login or registration attempt.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("another sign-in attempt is already in progress")]
    AttemptInProgress,

    #[error("the session has been shut down")]
    Closed,

    #[error(transparent)]
    Api(#[from] ClientError),
}

/// Failure of a todo operation.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("todo {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_accessors() {
        let err = ClientError::Http {
            status: StatusCode::UNAUTHORIZED,
            detail: Some("Invalid token".into()),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.detail(), Some("Invalid token"));
        assert_eq!(
            err.to_string(),
            "request failed with 401 Unauthorized: Invalid token"
        );
    }

    #[test]
    fn http_error_without_detail() {
        let err = ClientError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: None,
        };
        assert!(!err.is_unauthorized());
        assert!(err.to_string().ends_with("no detail"));
    }

    #[test]
    fn session_error_wraps_validation_transparently() {
        let mut errors = ValidationErrors::new();
        errors.push("email", "Enter a valid email");
        let err = SessionError::from(errors);
        assert_eq!(err.to_string(), "invalid input (email: Enter a valid email)");
    }
}
