//! Image-generation error types

use thiserror::Error;

/// Failures reported by an image generator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Prompt was empty after trimming
    #[error("Prompt is required")]
    EmptyPrompt,

    /// No API key configured for the provider
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// Transport-level failure (connect, timeout, TLS)
    #[error("Generation request failed: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("Generation service returned {status}: {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Provider error message
        message: String,
    },

    /// Response body could not be interpreted
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        match self {
            GenerationError::EmptyPrompt => true,
            GenerationError::Provider { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            GenerationError::EmptyPrompt => "VALIDATION_FAILED",
            GenerationError::NotConfigured(_) => "NOT_CONFIGURED",
            GenerationError::Transport(_) => "UNAVAILABLE",
            GenerationError::Provider { .. } => "PROVIDER_ERROR",
            GenerationError::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        let err = GenerationError::Provider {
            status: 429,
            message: "quota exhausted".to_string(),
        };
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "Generation service returned 429: quota exhausted"
        );

        let err = GenerationError::Provider {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "PROVIDER_ERROR");
    }

    #[test]
    fn test_empty_prompt() {
        assert_eq!(GenerationError::EmptyPrompt.to_string(), "Prompt is required");
        assert!(GenerationError::EmptyPrompt.is_client_error());
    }
}
