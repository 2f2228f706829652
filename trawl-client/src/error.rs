//! Error types for the Trawl upstream client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP status the upstream API uses to reject callers that exceed the rate ceiling
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Errors that can occur when talking to the upstream API
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if the upstream rejected the call for exceeding its rate ceiling
    ///
    /// Some upstream gateways report throttling with a generic status and the
    /// bare code as the message, so both shapes are recognised.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::ApiError { status, message } => {
                *status == TOO_MANY_REQUESTS || message.trim() == "429"
            }
            Self::RequestFailed(err) => {
                err.status().map(|s| s.as_u16()) == Some(TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_by_status() {
        assert!(ClientError::api_error(429, "Too Many Requests").is_rate_limited());
        assert!(!ClientError::api_error(500, "boom").is_rate_limited());
    }

    #[test]
    fn test_rate_limited_by_message() {
        assert!(ClientError::api_error(400, "429").is_rate_limited());
        assert!(!ClientError::ParseError("429".to_string()).is_rate_limited());
    }

    #[test]
    fn test_not_found() {
        assert!(ClientError::api_error(404, "No status found").is_not_found());
        assert!(ClientError::NotFound("@nobody".to_string()).is_not_found());
        assert!(!ClientError::api_error(503, "over capacity").is_not_found());
    }
}
