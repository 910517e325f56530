//! RFB handshake probing.
//!
//! This module implements the opening of the RFB (Remote Framebuffer)
//! handshake, up to and including the server's list of security types:
//!
//! 1. **Protocol Version** - the server sends a 12-byte banner
//!    (`RFB xxx.yyy\n`), the client answers with its own banner
//! 2. **Security Types** - the server sends a count byte followed by either
//!    the offered security-type identifiers or, when the count is zero, a
//!    length-prefixed failure reason
//!
//! The client always advertises RFB 3.8 whatever the server offers, and the
//! security section is read the same way for every server version.
//! Nothing past the security-type list is read or written.
//!
//! # Wire Format
//!
//! All multi-byte integers use **big-endian** (network byte order) per RFB specification.
//!
//! # Error Handling
//!
//! Failures are split in two:
//! - [`HandshakeError::Transport`] - the stream itself failed (reset, broken pipe)
//! - [`HandshakeError::Framing`] - the bytes did not match the expected
//!   length, structure or encoding, including the stream ending early
//!
//! A server that answers with a zero count is *not* an error: it is decoded
//! into [`SecurityOffer::Failure`].
//!
//! # References
//!
//! - [RFB Protocol 3.8 Specification](https://github.com/rfbproto/rfbproto/blob/master/rfbproto.rst)

use crate::io::{RfbInStream, RfbOutStream};
use crate::protocol_trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{timeout_at, Instant};

/// Length of a protocol version banner in bytes.
pub const BANNER_LEN: usize = 12;

/// RFB protocol version string sent by client.
///
/// Sent unchanged whatever version the server announces.
pub const CLIENT_VERSION_BYTES: &[u8; BANNER_LEN] = b"RFB 003.008\n";

/// Upper bound on a server-declared failure reason length.
pub const MAX_REASON_LEN: u32 = 1 << 20;

/// Received bytes did not match the expected handshake structure.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The stream ended (or stalled) before the 12-byte banner was complete.
    #[error("short banner: expected {expected} bytes, got {received}", expected = BANNER_LEN)]
    ShortBanner {
        /// Bytes received before the stream ended.
        received: usize,
    },

    /// The banner is not ASCII or does not match `RFB ddd.ddd\n`.
    #[error("malformed banner: {0:?}")]
    MalformedBanner(String),

    /// The stream ended (or stalled) in the middle of a field.
    #[error("short read: stream ended while reading {field}")]
    ShortRead {
        /// The field being read.
        field: &'static str,
    },

    /// The failure reason is not valid UTF-8.
    #[error("failure reason is not valid UTF-8: {0}")]
    InvalidReason(#[from] std::string::FromUtf8Error),

    /// The declared failure reason length exceeds [`MAX_REASON_LEN`].
    #[error("failure reason length {0} exceeds limit of {max} bytes", max = MAX_REASON_LEN)]
    ReasonTooLong(u32),
}

/// Errors raised while driving the handshake over a stream.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// The peer sent bytes that do not form a valid handshake message.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
}

impl HandshakeError {
    /// Map an I/O error from a read: early EOF is a framing problem, anything
    /// else is a transport failure.
    fn from_read(err: std::io::Error, short: impl FnOnce() -> FramingError) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Framing(short())
        } else {
            Self::Transport(err)
        }
    }
}

/// RFB protocol version as announced in a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version (0-999).
    pub major: u16,
    /// Minor version (0-999).
    pub minor: u16,
}

impl ProtocolVersion {
    /// RFB 3.3
    pub const V3_3: Self = Self::new(3, 3);
    /// RFB 3.7
    pub const V3_7: Self = Self::new(3, 7);
    /// RFB 3.8
    pub const V3_8: Self = Self::new(3, 8);

    /// Create a version.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Parse a 12-byte banner of the form `RFB ddd.ddd\n`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::MalformedBanner`] if the bytes are not ASCII or
    /// do not match the pattern exactly.
    pub fn parse_banner(banner: &[u8; BANNER_LEN]) -> Result<Self, FramingError> {
        let malformed = || FramingError::MalformedBanner(String::from_utf8_lossy(banner).into_owned());

        if !banner.is_ascii()
            || &banner[0..4] != b"RFB "
            || banner[7] != b'.'
            || banner[11] != b'\n'
        {
            return Err(malformed());
        }

        let major = parse_digits(&banner[4..7]).ok_or_else(malformed)?;
        let minor = parse_digits(&banner[8..11]).ok_or_else(malformed)?;
        Ok(Self { major, minor })
    }

    /// Format this version as a 12-byte banner.
    ///
    /// Components above 999 cannot be represented and are clamped.
    pub fn to_banner(&self) -> [u8; BANNER_LEN] {
        let text = format!("RFB {:03}.{:03}\n", self.major.min(999), self.minor.min(999));
        let mut banner = [0u8; BANNER_LEN];
        banner.copy_from_slice(text.as_bytes());
        banner
    }

    /// Whether this is one of the versions published by the RFB specification
    /// (3.3, 3.7, 3.8).
    pub fn is_standard(&self) -> bool {
        matches!(*self, Self::V3_3 | Self::V3_7 | Self::V3_8)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RFB {:03}.{:03}", self.major, self.minor)
    }
}

/// Parse exactly three ASCII decimal digits.
fn parse_digits(digits: &[u8]) -> Option<u16> {
    if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')),
    )
}

/// The server's answer to the client version banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SecurityOffer {
    /// The server offered no security types and explained why.
    Failure(String),
    /// The offered security-type identifiers, in the order the server sent them.
    Types(Vec<u8>),
}

impl SecurityOffer {
    /// The failure reason, if the server declined.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failure(reason) => Some(reason),
            Self::Types(_) => None,
        }
    }

    /// The offered security types; empty when the server declined.
    pub fn types(&self) -> &[u8] {
        match self {
            Self::Failure(_) => &[],
            Self::Types(types) => types,
        }
    }
}

/// Read and parse the server's 12-byte version banner.
pub async fn read_server_version<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
) -> Result<ProtocolVersion, HandshakeError> {
    let mut banner = [0u8; BANNER_LEN];
    if let Err(e) = instream.read_bytes(&mut banner).await {
        let received = instream.available();
        return Err(HandshakeError::from_read(e, || FramingError::ShortBanner { received }));
    }
    protocol_trace::hexdump("IN  banner", &banner, BANNER_LEN);

    let version = ProtocolVersion::parse_banner(&banner)?;
    protocol_trace::in_msg("ProtocolVersion", &version.to_string());
    Ok(version)
}

/// Send the fixed client version banner (`RFB 003.008\n`).
pub async fn send_client_version<W: AsyncWrite + Unpin>(
    outstream: &mut RfbOutStream<W>,
) -> Result<(), HandshakeError> {
    outstream.write_bytes(CLIENT_VERSION_BYTES);
    outstream.flush().await.map_err(HandshakeError::Transport)?;
    protocol_trace::out_msg("ProtocolVersion", "RFB 003.008");
    Ok(())
}

/// Read the security-type count and the offer or failure reason that follows.
pub async fn read_security_offer<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
) -> Result<SecurityOffer, HandshakeError> {
    read_offer(instream, None).await
}

/// Like [`read_security_offer`], but gives up at `deadline`.
///
/// Expiry is reported as [`FramingError::ShortRead`] naming the field that
/// was being read when time ran out.
pub async fn read_security_offer_until<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
    deadline: Instant,
) -> Result<SecurityOffer, HandshakeError> {
    read_offer(instream, Some(deadline)).await
}

async fn read_offer<R: AsyncRead + Unpin>(
    instream: &mut RfbInStream<R>,
    deadline: Option<Instant>,
) -> Result<SecurityOffer, HandshakeError> {
    let count = read_field(deadline, "security type count", instream.read_u8()).await?;

    if count == 0 {
        let reason_len =
            read_field(deadline, "failure reason length", instream.read_u32()).await?;
        if reason_len > MAX_REASON_LEN {
            return Err(FramingError::ReasonTooLong(reason_len).into());
        }
        let raw = read_field(
            deadline,
            "failure reason",
            instream.read_vec(reason_len as usize),
        )
        .await?;
        let reason = String::from_utf8(raw).map_err(FramingError::from)?;
        protocol_trace::in_msg("SecurityTypes", &format!("count=0 reason={:?}", reason));
        return Ok(SecurityOffer::Failure(reason));
    }

    let types = read_field(
        deadline,
        "security types",
        instream.read_vec(usize::from(count)),
    )
    .await?;
    protocol_trace::in_msg("SecurityTypes", &format!("count={} types={:?}", count, types));
    Ok(SecurityOffer::Types(types))
}

/// Await one field read. Early EOF and deadline expiry both count as a
/// short read of `field`.
async fn read_field<T>(
    deadline: Option<Instant>,
    field: &'static str,
    read: impl Future<Output = std::io::Result<T>>,
) -> Result<T, HandshakeError> {
    let result = match deadline {
        Some(deadline) => timeout_at(deadline, read)
            .await
            .map_err(|_| HandshakeError::Framing(short(field)))?,
        None => read.await,
    };
    result.map_err(|e| HandshakeError::from_read(e, || short(field)))
}

fn short(field: &'static str) -> FramingError {
    FramingError::ShortRead { field }
}

/// Run the whole probe handshake over an already connected stream pair.
///
/// Returns the server version and its security offer. Callers that need a
/// deadline per step (as the prober does) call the individual functions
/// instead.
pub async fn probe_handshake<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    instream: &mut RfbInStream<R>,
    outstream: &mut RfbOutStream<W>,
) -> Result<(ProtocolVersion, SecurityOffer), HandshakeError> {
    let version = read_server_version(instream).await?;
    send_client_version(outstream).await?;
    let offer = read_security_offer(instream).await?;
    Ok((version, offer))
}
