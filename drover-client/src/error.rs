//! Error types for the drover control channel

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the orchestrator
#[derive(Debug, Error)]
pub enum ClientError {
    /// The channel is between connections; callers retry later
    #[error("control channel is not connected")]
    NotConnected,

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

    /// The server answered but did not acknowledge the request
    #[error("{method} was not acknowledged by the orchestrator")]
    NotDone {
        /// Wire method name
        method: String,
    },

    /// Another refresh of the same git installation is underway
    #[error("git token refresh already in progress")]
    RefreshInProgress,

    /// Invalid channel configuration (URL, TLS material)
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this is the "not connected" sentinel
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Check if the failure is in the transport rather than the application
    pub fn is_transport(&self) -> bool {
        match self {
            Self::NotConnected | Self::RequestFailed(_) => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ClientError::NotConnected.is_transport());
        assert!(ClientError::NotConnected.is_not_connected());
        assert!(ClientError::api_error(503, "unavailable").is_transport());
        assert!(!ClientError::api_error(400, "bad").is_transport());
        assert!(
            !ClientError::NotDone {
                method: "Jobs.MarkCompleteV1".to_string()
            }
            .is_transport()
        );
    }
}
