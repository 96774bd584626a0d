//! Error types for sessions, transports and target validation.

use std::time::Duration;

use thiserror::Error;

/// A target identifier outside the configured range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("target {value} is outside the supported range [{min}, {max}]")]
pub struct ValidationError {
    pub value: i64,
    pub min: u16,
    pub max: u16,
}

/// Transient connectivity failures. Re-attempting may succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableKind {
    ConnectionRefused,
    Network,
    Timeout,
}

/// Protocol or data violations. Re-attempting will not help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// Payload could not be decoded into a seat count.
    Decode,
    /// Malformed or unexpected protocol message.
    Protocol,
    /// The server answered with an error response code.
    Response,
}

/// Errors raised by a [`Transport`](crate::Transport) while opening a
/// subscription or receiving notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{message}")]
    Retryable { kind: RetryableKind, message: String },
    #[error("{message}")]
    Fatal { kind: FatalKind, message: String },
}

impl TransportError {
    pub fn retryable(kind: RetryableKind, message: impl Into<String>) -> Self {
        TransportError::Retryable {
            kind,
            message: message.into(),
        }
    }

    pub fn fatal(kind: FatalKind, message: impl Into<String>) -> Self {
        TransportError::Fatal {
            kind,
            message: message.into(),
        }
    }

    /// Classify an I/O error from the underlying socket.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        let kind = match err.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                RetryableKind::ConnectionRefused
            }
            ErrorKind::TimedOut => RetryableKind::Timeout,
            _ => RetryableKind::Network,
        };
        TransportError::retryable(kind, err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Retryable { .. })
    }
}

/// Failure while closing a subscription handle. Never propagated over the
/// error that caused the close.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to close subscription: {message}")]
pub struct CleanupError {
    pub message: String,
}

/// Terminal outcomes of [`ObservationSession::run`](crate::ObservationSession::run).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("observation failed: {0}")]
    Fatal(TransportError),
    #[error(
        "failed to connect after {attempts} attempts (retry delay {delay:?}); \
         the remote resource may be unreachable"
    )]
    RetriesExhausted { attempts: u32, delay: Duration },
}

/// Errors from loading [`SessionConfig`](crate::SessionConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Reasons an [`ObservationSession`](crate::ObservationSession) cannot be
/// built. Raised before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error(transparent)]
    Target(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
