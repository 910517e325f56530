//! Error types for the RFB prober.

use rfb_protocol::{FramingError, HandshakeError};
use std::io;
use thiserror::Error;

/// Errors that can end a probe before a report is produced.
///
/// A server that completes the handshake but offers no security types is
/// not an error; see [`ProbeReport::rejection_reason`](crate::ProbeReport::rejection_reason).
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The transport could not be established or broke mid-handshake
    /// (refused, unreachable, DNS failure, TLS failure, reset, timed out).
    #[error("Connection failed: {0}")]
    Connection(#[source] io::Error),

    /// The server sent bytes that do not match the handshake structure.
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Invalid probe input or configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HandshakeError> for ProbeError {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::Transport(e) => Self::Connection(e),
            HandshakeError::Framing(e) => Self::Framing(e),
        }
    }
}

impl ProbeError {
    /// Build a connection error for an expired deadline.
    pub(crate) fn timed_out(what: &str, timeout: std::time::Duration) -> Self {
        Self::Connection(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} timed out after {:?}", what, timeout),
        ))
    }

    /// Returns true if the probe may succeed when repeated.
    ///
    /// Only transport failures are transient. Framing errors mean the peer
    /// speaks something other than RFB.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns true if this is a fatal error that should not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Returns true if the failure was a deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Connection(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}
