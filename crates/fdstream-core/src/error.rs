//! Error types for fdstream-core

use std::fmt;
use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// A failed system call, reduced to what a caller can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsError {
    /// Platform error code (`errno` on POSIX, `GetLastError` on Windows).
    /// Zero when the failure did not come with a code, e.g. a short write.
    pub code: i32,
    /// Human-readable description of the failure
    pub message: String,
}

impl OsError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The error reported for a write that the OS accepted only part of.
    #[must_use]
    pub fn short_write() -> Self {
        Self::new(0, "failed to write whole buffer")
    }
}

impl From<&std::io::Error> for OsError {
    fn from(err: &std::io::Error) -> Self {
        Self {
            code: err.raw_os_error().unwrap_or(0),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for OsError {
    fn from(err: std::io::Error) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (os error {})", self.message, self.code)
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Main error type for fdstream-core
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The stream is closed, unset, or lacks the capability for the request
    #[error("Bad stream handle: {0}")]
    BadHandle(&'static str),

    /// Malformed read selector, timeout or clone request; no I/O was attempted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Deadline elapsed before the request was satisfied
    #[error("Timed out with {} byte(s) read", partial.len())]
    Timeout { partial: Vec<u8> },

    /// End of stream reached with nothing read
    #[error("End of stream")]
    Eof,

    /// System call failure, with any bytes read before it
    #[error("{error}")]
    Os { error: OsError, partial: Vec<u8> },

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors outside the read/write engine (dup, probing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Platform error code, for the variants that carry one.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Os { error, .. } => Some(error.code),
            Self::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }

    /// Bytes read before the failure, if any.
    #[must_use]
    pub fn partial(&self) -> &[u8] {
        match self {
            Self::Timeout { partial } | Self::Os { partial, .. } => partial,
            _ => &[],
        }
    }

    pub(crate) fn os(source: impl Into<OsError>) -> Self {
        Self::Os {
            error: source.into(),
            partial: Vec::new(),
        }
    }
}

impl From<fdstream_sys::Error> for Error {
    fn from(err: fdstream_sys::Error) -> Self {
        Self::Io(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_error_from_raw_code() {
        let io = std::io::Error::from_raw_os_error(9);
        let os = OsError::from(&io);
        assert_eq!(os.code, 9);
        assert!(!os.message.is_empty());
        assert!(os.to_string().contains("os error 9"));
    }

    #[test]
    fn short_write_has_no_code() {
        let os = OsError::short_write();
        assert_eq!(os.code, 0);
        assert!(os.message.contains("write"));
    }

    #[test]
    fn timeout_display_counts_partial() {
        let err = Error::Timeout {
            partial: b"abc".to_vec(),
        };
        assert_eq!(err.to_string(), "Timed out with 3 byte(s) read");
        assert_eq!(err.partial(), b"abc");
    }

    #[test]
    fn os_variant_exposes_code_and_partial() {
        let err = Error::Os {
            error: OsError::new(5, "Input/output error"),
            partial: b"xy".to_vec(),
        };
        assert_eq!(err.os_code(), Some(5));
        assert_eq!(err.partial(), b"xy");
        assert!(err.to_string().contains("Input/output error"));
    }

    #[test]
    fn bad_handle_has_no_code() {
        let err = Error::BadHandle("stream is closed");
        assert_eq!(err.os_code(), None);
        assert!(err.partial().is_empty());
    }

    #[test]
    fn sys_error_converts_through_io() {
        let sys = fdstream_sys::Error::Fcntl(std::io::Error::from_raw_os_error(9));
        let err: Error = sys.into();
        assert_eq!(err.os_code(), Some(9));
    }
}
