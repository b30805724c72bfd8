//! Error types for the service registry substrate.
//!
//! Every variant renders the human-readable text that ends up in an `NK`
//! response frame, so callers on the far side of the wire see the same
//! message that is logged here.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the registry, service runtime and client.
#[derive(Debug, Error)]
pub enum SoaError {
    // Codec errors
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    #[error("Frame content of {len} bytes exceeds the maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Invalid control message: {message}")]
    InvalidControl { message: String },

    // Routing errors
    #[error("Service {name} not found")]
    UnknownService { name: String },

    #[error("Method '{method}' not found. Available methods: {}", available.join(", "))]
    UnknownMethod {
        method: String,
        available: Vec<String>,
    },

    #[error("Error executing method '{method}': {message}")]
    Handler { method: String, message: String },

    // Network errors
    #[error("Service call error: {service} unreachable at {addr}: {message}")]
    DownstreamUnreachable {
        service: String,
        addr: String,
        message: String,
    },

    #[error("Registration with {registry} failed: {message}")]
    RegistrationFailed { registry: String, message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, SoaError>;

impl From<std::io::Error> for SoaError {
    fn from(err: std::io::Error) -> Self {
        SoaError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SoaError {
    /// Shorthand for a malformed frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        SoaError::MalformedFrame {
            message: message.into(),
        }
    }

    /// Shorthand for a bad register/unregister payload.
    pub fn invalid_control(message: impl Into<String>) -> Self {
        SoaError::InvalidControl {
            message: message.into(),
        }
    }

    /// Whether the error came from the network rather than from the protocol.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SoaError::Io { .. }
                | SoaError::Timeout(_)
                | SoaError::DownstreamUnreachable { .. }
                | SoaError::RegistrationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_message() {
        let err = SoaError::UnknownService {
            name: "forum".into(),
        };
        assert_eq!(err.to_string(), "Service forum not found");
    }

    #[test]
    fn test_unknown_method_lists_available() {
        let err = SoaError::UnknownMethod {
            method: "nope".into(),
            available: vec!["add".into(), "divide".into()],
        };
        assert_eq!(
            err.to_string(),
            "Method 'nope' not found. Available methods: add, divide"
        );
    }

    #[test]
    fn test_handler_message() {
        let err = SoaError::Handler {
            method: "divide".into(),
            message: "division by zero".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error executing method 'divide': division by zero"
        );
    }

    #[test]
    fn test_network_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(SoaError::from(io).is_network());
        assert!(!SoaError::malformed("short").is_network());
    }
}
