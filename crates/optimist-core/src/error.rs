//! Error types for the optimistic state engine

use std::fmt;

use thiserror::Error;

/// Core Optimist errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimistError {
    /// A mutation could not be built from what the caller supplied
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// An immediately-resolving update needs a Tokio runtime to host its
    /// settlement continuation
    #[error("No async runtime available to schedule the settlement continuation")]
    RuntimeUnavailable,
}

/// Result type for Optimist operations
pub type OptimistResult<T> = Result<T, OptimistError>;

/// Reason an asynchronous operation reported failure.
///
/// This is data, not an engine error: it travels inside a failed
/// resolved-update report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
#[error("{message}")]
pub struct Rejection {
    message: String,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Rejection {
            message: message.into(),
        }
    }

    /// Capture the rendered form of any error
    pub fn from_error<E: fmt::Display + ?Sized>(err: &E) -> Self {
        Rejection::new(err.to_string())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for Rejection {
    fn from(message: &str) -> Self {
        Rejection::new(message)
    }
}

impl From<String> for Rejection {
    fn from(message: String) -> Self {
        Rejection::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_renders_message() {
        let reason = Rejection::from("500: We don't like Marcy.");
        assert_eq!(reason.to_string(), "500: We don't like Marcy.");
        assert_eq!(reason.message(), "500: We don't like Marcy.");
    }

    #[test]
    fn test_rejection_from_error() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
        let reason = Rejection::from_error(&io);
        assert_eq!(reason.message(), "upstream timed out");
    }

    #[test]
    fn test_error_display() {
        let err = OptimistError::InvalidMutation("edit 0 has an empty path".into());
        assert_eq!(err.to_string(), "Invalid mutation: edit 0 has an empty path");
    }
}
