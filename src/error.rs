//! Error types for the exchange
//!
//! Every failure a session can hit is one of a handful of distinguishable
//! kinds. Transport and protocol failures are fatal to the session that
//! raised them; the remaining kinds surface misuse of the library itself.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::codec::ScaleExponent;

/// Failures of the framed byte channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("no progress within {0:?}")]
    Timeout(Duration),
}

/// Violations of the session protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected {expected} frame, received {got}")]
    UnexpectedMessage { expected: String, got: String },

    #[error("frame tagged for variant {got}, session runs {expected}")]
    VariantMismatch { expected: String, got: String },

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u16),

    #[error("variant {0} is not accepted by this compute party")]
    VariantNotAllowed(String),

    #[error("malformed {role} payload: {reason}")]
    Malformed { role: String, reason: String },

    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    #[error("missing key material: {0}")]
    MissingKey(String),

    #[error("handshake cannot {action} in state {state}")]
    InvalidState { state: String, action: String },

    #[error("session aborted by peer: {0}")]
    RemoteAbort(String),
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("scale exponent mismatch: {lhs} vs {rhs}")]
    ScaleMismatch { lhs: ScaleExponent, rhs: ScaleExponent },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short stable label for operator-facing reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Protocol(_) => "protocol",
            Error::ScaleMismatch { .. } => "scale-mismatch",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(TransportError::Io(err))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
