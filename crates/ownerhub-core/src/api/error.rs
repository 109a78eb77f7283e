use thiserror::Error;

use crate::outcome::ErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    /// The access token could not be renewed. Tokens have been cleared and the
    /// owner has to log in again.
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    /// The envelope came back with `success: false`.
    #[error("{message}")]
    Business {
        code: Option<String>,
        message: String,
        details: Option<String>,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized | ApiError::SessionExpired | ApiError::AccessDenied(_) => {
                ErrorKind::Authentication
            }
            ApiError::NetworkError(_) => ErrorKind::Network,
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => ErrorKind::Data,
            ApiError::NotFound(_)
            | ApiError::RateLimited
            | ApiError::ServerError(_)
            | ApiError::Business { .. } => ErrorKind::Server,
        }
    }

    /// Message suitable for showing to the owner, when the server supplied one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Business { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// True when this error means the stored session is gone.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}
