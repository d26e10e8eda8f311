//! Gamramstone Error Definitions
//!
//! Defines error types used throughout the client core.

use thiserror::Error;

use super::envelope::ApiFailure;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Apply Preconditions
    // =========================================================================
    #[error("Please sign in before applying captions")]
    NotAuthenticated,

    #[error("Another caption is currently uploading")]
    UploadInProgress,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    #[error(transparent)]
    Api(#[from] ApiFailure),

    #[error("Network error: {0}")]
    Network(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Message raised on the notification surface.
    ///
    /// Remote failures are surfaced verbatim, so this is the `Display` text.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Returns the classifier category when the error came from a remote call.
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            Self::Api(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Internal(format!("Failed to build request: {}", err));
        }
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_is_verbatim_for_api_failures() {
        let err: CoreError = ApiFailure::Application("bad id".to_string()).into();
        assert_eq!(err.user_message(), "Error: bad id");
        assert!(matches!(
            err.api_failure(),
            Some(ApiFailure::Application(msg)) if msg == "bad id"
        ));
    }

    #[test]
    fn test_precondition_messages() {
        assert_eq!(
            CoreError::UploadInProgress.user_message(),
            "Another caption is currently uploading"
        );
        assert!(CoreError::NotAuthenticated.api_failure().is_none());
    }
}
