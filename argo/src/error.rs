//! Error types for Argo
//!
//! Provides a unified error type for all interpreter, registry, and daemon
//! operations, following the taxonomy of input / protocol / system /
//! io-channel / workflow / provider errors.

use std::fmt;

/// Result type alias for Argo operations
pub type Result<T> = std::result::Result<T, ArgoError>;

/// Main error type for Argo operations
#[derive(Debug)]
pub enum ArgoError {
    /// Input was null, invalid, too large, or not found
    InputInvalid(String),
    /// Input data exceeded a buffer or size limit
    InputTooLarge(String),

    /// Malformed JSON or missing required field
    ProtocolFormat(String),

    /// File I/O, process spawn, network, or timeout failure
    System(String),
    /// Operation exceeded its allotted time
    Timeout(String),

    /// I/O channel has no attached reader/writer
    IoInvalid(String),
    /// I/O channel read would block (no data yet)
    WouldBlock,
    /// I/O channel's writer side has closed
    Eof,

    /// Workflow id not found in the registry
    NotFound(String),
    /// Workflow id already exists in the registry
    Duplicate(String),
    /// Registry entry is not in a state that permits the operation
    InvalidState(String),
    /// `workflow_call` recursion exceeded the policy maximum
    MaxRecursion,
    /// A backward edge exceeded its `max_iterations` bound
    MaxIterations,
    /// The global step-count safety bound was exceeded
    MaxSteps,

    /// The AI provider call failed or timed out
    Provider(String),

    /// Configuration could not be loaded or parsed
    Config(String),

    /// Wrapped I/O error
    Io(std::io::Error),
    /// Wrapped JSON (de)serialization error
    Serde(serde_json::Error),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for ArgoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputInvalid(msg) => write!(f, "INPUT_INVALID: {}", msg),
            Self::InputTooLarge(msg) => write!(f, "INPUT_TOO_LARGE: {}", msg),
            Self::ProtocolFormat(msg) => write!(f, "PROTOCOL_FORMAT: {}", msg),
            Self::System(msg) => write!(f, "SYSTEM: {}", msg),
            Self::Timeout(msg) => write!(f, "TIMEOUT: {}", msg),
            Self::IoInvalid(msg) => write!(f, "IO_INVALID: {}", msg),
            Self::WouldBlock => write!(f, "WOULDBLOCK"),
            Self::Eof => write!(f, "EOF"),
            Self::NotFound(msg) => write!(f, "NOT_FOUND: {}", msg),
            Self::Duplicate(msg) => write!(f, "DUPLICATE: {}", msg),
            Self::InvalidState(msg) => write!(f, "INVALID_STATE: {}", msg),
            Self::MaxRecursion => write!(f, "MAX_RECURSION exceeded"),
            Self::MaxIterations => write!(f, "INPUT_INVALID: loop max_iterations exceeded"),
            Self::MaxSteps => write!(f, "MAX_STEPS safety bound exceeded"),
            Self::Provider(msg) => write!(f, "PROVIDER: {}", msg),
            Self::Config(msg) => write!(f, "CONFIG: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Serde(err) => write!(f, "serialization error: {}", err),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ArgoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArgoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ArgoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err)
    }
}

impl From<String> for ArgoError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for ArgoError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

/// Taxonomy code string, used for registry/log output and the daemon's
/// JSON error bodies.
impl ArgoError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "INPUT_INVALID",
            Self::InputTooLarge(_) => "INPUT_TOO_LARGE",
            Self::ProtocolFormat(_) => "PROTOCOL_FORMAT",
            Self::System(_) => "SYSTEM",
            Self::Timeout(_) => "TIMEOUT",
            Self::IoInvalid(_) => "IO_INVALID",
            Self::WouldBlock => "WOULDBLOCK",
            Self::Eof => "EOF",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Duplicate(_) => "DUPLICATE",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::MaxRecursion => "MAX_RECURSION",
            Self::MaxIterations => "INPUT_INVALID",
            Self::MaxSteps => "MAX_STEPS",
            Self::Provider(_) => "PROVIDER",
            Self::Config(_) => "CONFIG",
            Self::Io(_) => "SYSTEM",
            Self::Serde(_) => "PROTOCOL_FORMAT",
            Self::Other(_) => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code_match() {
        let err = ArgoError::NotFound("wf-1".to_string());
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("wf-1"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ArgoError = io_err.into();
        assert_eq!(err.code(), "SYSTEM");
    }

    #[test]
    fn test_max_iterations_code_is_input_invalid() {
        assert_eq!(ArgoError::MaxIterations.code(), "INPUT_INVALID");
    }
}
