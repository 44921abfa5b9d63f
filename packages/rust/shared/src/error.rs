//! Error types for linkboard.
//!
//! Library crates use [`LinkboardError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

/// Top-level error type for all linkboard operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkboardError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input validation error (bad link URL, bad CLI arguments).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Network/HTTP error during feed fetching or page classification.
    #[error("network error: {0}")]
    Network(String),

    /// Feed payload or HTML shape error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// No post exists with the requested id.
    #[error("post {id} not found")]
    NotFound { id: i64 },

    /// A submit lost the insert race repeatedly and ran out of attempts.
    #[error("could not submit post with link {link_url} after retrying")]
    SubmitRetriesExhausted { link_url: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkboardError>;

impl LinkboardError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LinkboardError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = LinkboardError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "post 42 not found");

        let err = LinkboardError::SubmitRetriesExhausted {
            link_url: "http://x.com".into(),
        };
        assert!(err.to_string().contains("http://x.com"));
    }
}
