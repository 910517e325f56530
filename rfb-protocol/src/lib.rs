//! RFB (Remote Framebuffer) handshake protocol layer.
//!
//! This crate provides the wire-level pieces needed to probe an RFB server:
//! buffered big-endian streams, the version banner codec, and decoding of the
//! server's security-type offer.
//!
//! # Modules
//!
//! - [`io`] - Buffered I/O streams (RfbInStream, RfbOutStream)
//! - [`handshake`] - Version banner exchange and security offer decoding
//! - [`security`] - Security-type identifiers and their names
//! - [`protocol_trace`] - Opt-in wire tracing (`RFB_PROBE_TRACE=1`)
//!
//! # Examples
//!
//! ```no_run
//! use rfb_protocol::{probe_handshake, RfbInStream, RfbOutStream};
//! use tokio::net::TcpStream;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let stream = TcpStream::connect("localhost:5900").await?;
//! let (reader, writer) = tokio::io::split(stream);
//! let (mut input, mut output) = (RfbInStream::new(reader), RfbOutStream::new(writer));
//!
//! let (version, offer) = probe_handshake(&mut input, &mut output).await?;
//! println!("{} offers {:?}", version, offer);
//! # Ok(())
//! # }
//! ```

pub mod handshake;
pub mod io;
pub mod protocol_trace;
pub mod security;

#[cfg(test)]
mod proptest_framing;

// Re-export commonly used types
pub use handshake::{
    probe_handshake, FramingError, HandshakeError, ProtocolVersion, SecurityOffer,
    CLIENT_VERSION_BYTES,
};
pub use io::{RfbInStream, RfbOutStream};
pub use security::security_type_name;
