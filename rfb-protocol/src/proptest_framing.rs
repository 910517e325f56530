//! Property tests for handshake framing.
//!
//! These check banner parsing over the whole input space and that security
//! offer decoding is robust against fragmentation at arbitrary byte
//! boundaries and against truncation.

use crate::handshake::*;
use crate::io::{RfbInStream, RfbOutStream};
use proptest::prelude::*;

/// A fragmenting reader that splits reads at a specific boundary.
///
/// This simulates network fragmentation by only allowing reads up to
/// a specific position, then requiring a second read for the rest.
struct FragmentingReader {
    data: Vec<u8>,
    pos: usize,
    boundary: usize,
}

impl FragmentingReader {
    fn new(data: Vec<u8>, boundary: usize) -> Self {
        let boundary = boundary.min(data.len());
        Self {
            data,
            pos: 0,
            boundary,
        }
    }
}

impl tokio::io::AsyncRead for FragmentingReader {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        if self.pos >= self.data.len() {
            return std::task::Poll::Ready(Ok(()));
        }

        // Only read up to boundary on first pass, or remaining data after
        let available = if self.pos < self.boundary {
            (self.boundary - self.pos).min(buf.remaining())
        } else {
            (self.data.len() - self.pos).min(buf.remaining())
        };

        if available == 0 {
            return std::task::Poll::Ready(Ok(()));
        }

        let data = &self.data[self.pos..self.pos + available];
        buf.put_slice(data);
        self.pos += available;

        std::task::Poll::Ready(Ok(()))
    }
}

/// Reference check for `RFB ddd.ddd\n`.
fn matches_banner_pattern(b: &[u8; BANNER_LEN]) -> bool {
    &b[0..4] == b"RFB "
        && b[4..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'.'
        && b[8..11].iter().all(u8::is_ascii_digit)
        && b[11] == b'\n'
}

async fn encode_offer(offer: &SecurityOffer) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut out_stream = RfbOutStream::new(&mut buffer);
    match offer {
        SecurityOffer::Failure(reason) => {
            out_stream.write_u8(0);
            out_stream.write_u32(reason.len() as u32);
            out_stream.write_bytes(reason.as_bytes());
        }
        SecurityOffer::Types(types) => {
            out_stream.write_u8(types.len() as u8);
            out_stream.write_bytes(types);
        }
    }
    out_stream.flush().await.unwrap();
    buffer
}

fn arbitrary_offer() -> impl Strategy<Value = SecurityOffer> {
    prop_oneof![
        "\\PC{0,64}".prop_map(SecurityOffer::Failure),
        prop::collection::vec(any::<u8>(), 1..=255).prop_map(SecurityOffer::Types),
    ]
}

proptest! {
    /// Every well-formed banner parses back to its exact version numbers.
    #[test]
    fn test_valid_banner_recovers_version(major in 0u16..=999, minor in 0u16..=999) {
        let text = format!("RFB {:03}.{:03}\n", major, minor);
        let mut banner = [0u8; BANNER_LEN];
        banner.copy_from_slice(text.as_bytes());

        let version = ProtocolVersion::parse_banner(&banner).unwrap();
        prop_assert_eq!(version, ProtocolVersion::new(major, minor));
        prop_assert_eq!(version.to_banner(), banner);
    }

    /// Arbitrary 12-byte inputs parse exactly when they match the pattern,
    /// and otherwise fail with a framing error.
    #[test]
    fn test_arbitrary_banner_never_panics(bytes in prop::array::uniform12(any::<u8>())) {
        match ProtocolVersion::parse_banner(&bytes) {
            Ok(_) => prop_assert!(matches_banner_pattern(&bytes)),
            Err(FramingError::MalformedBanner(_)) => prop_assert!(!matches_banner_pattern(&bytes)),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Banners that differ from a valid one in a single position are rejected
    /// unless the change keeps a digit a digit.
    #[test]
    fn test_mutated_banner(pos in 0usize..BANNER_LEN, byte in any::<u8>()) {
        let mut banner = *b"RFB 003.008\n";
        banner[pos] = byte;
        let result = ProtocolVersion::parse_banner(&banner);
        prop_assert_eq!(result.is_ok(), matches_banner_pattern(&banner));
    }

    /// Security offers decode identically however the stream is fragmented.
    #[test]
    fn test_offer_fragmentation(offer in arbitrary_offer(), boundary in 0usize..300) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let buffer = encode_offer(&offer).await;
            let reader = FragmentingReader::new(buffer, boundary);
            let mut in_stream = RfbInStream::new(reader);

            let parsed = read_security_offer(&mut in_stream).await.unwrap();
            prop_assert_eq!(offer, parsed);
            Ok(())
        })?;
    }

    /// Any strict prefix of an offer is a framing error, never a result.
    #[test]
    fn test_truncated_offer_is_framing_error(offer in arbitrary_offer(), cut in any::<prop::sample::Index>()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let buffer = encode_offer(&offer).await;
            let len = cut.index(buffer.len());
            let mut in_stream = RfbInStream::new(std::io::Cursor::new(buffer[..len].to_vec()));

            let result = read_security_offer(&mut in_stream).await;
            prop_assert!(
                matches!(result, Err(HandshakeError::Framing(_))),
                "prefix of {} bytes gave {:?}", len, result
            );
            Ok(())
        })?;
    }
}
