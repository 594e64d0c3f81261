use std::io;
use thiserror::Error;

/// Custom error types for the TCNet/LTC core
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    /// Datagram shorter than the fixed layout requires
    #[error("Truncated packet: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Datagram with a bad magic, version or field encoding
    #[error("Malformed packet: {0}")]
    Malformed(&'static str),

    #[error("Invalid timecode: {field} = {value}")]
    InvalidTimeCode { field: &'static str, value: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates an out-of-range timecode field error
    pub fn invalid_timecode(field: &'static str, value: impl Into<u32>) -> Self {
        Error::InvalidTimeCode { field, value: value.into() }
    }

    /// Returns true for errors caused by untrusted input rather than local resources
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. } | Error::Malformed(_) | Error::InvalidTimeCode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::network("test error");
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.to_string(), "Network error: test error");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_malformed_input());
    }

    #[test]
    fn test_timecode_error_display() {
        let err = Error::invalid_timecode("frames", 30u8);
        assert_eq!(err.to_string(), "Invalid timecode: frames = 30");
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_truncated_display() {
        let err = Error::Truncated { expected: 24, actual: 3 };
        assert_eq!(err.to_string(), "Truncated packet: expected 24 bytes, got 3");
    }
}
