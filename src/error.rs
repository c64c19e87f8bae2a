use std::fmt;

use crate::protocol::ResultCode;

#[derive(Debug)]
pub enum Error {
    /// Network exchange failed after exhausting the retry bounds.
    Connectivity { attempts: u32, source: std::io::Error },
    Protocol(String),
    CommandRejected { code: ResultCode },
    NotFound(u8),
    InvalidArgument(String),
    Io(std::io::Error),
}

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network or framing trouble; retrying later may succeed.
    Transient,
    /// The device refused the PIN. Needs reconfiguration, not a retry.
    Auth,
    /// The device does not understand what we sent.
    Incompatible,
    /// Rejected locally before talking to the device.
    Caller,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connectivity { .. } | Error::Protocol(_) => ErrorCategory::Transient,
            Error::CommandRejected { code } => match code {
                ResultCode::BadPin => ErrorCategory::Auth,
                _ => ErrorCategory::Incompatible,
            },
            Error::NotFound(_) | Error::InvalidArgument(_) | Error::Io(_) => ErrorCategory::Caller,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    pub(crate) fn connectivity(attempts: u32, source: std::io::Error) -> Self {
        Error::Connectivity { attempts, source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connectivity { attempts, source } => {
                write!(f, "connectivity error after {attempts} attempt(s): {source}")
            }
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::CommandRejected { code } => write!(f, "command rejected: {code}"),
            Error::NotFound(id) => write!(f, "zone not found: {id}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connectivity { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
