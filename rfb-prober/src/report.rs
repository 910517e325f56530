//! Probe reports.

use crate::errors::ProbeError;
use rfb_common::Endpoint;
use rfb_protocol::{security_type_name, ProtocolVersion, SecurityOffer};
use serde::Serialize;
use std::fmt;

/// Outcome of one probe: a probe either yields a report or a [`ProbeError`].
pub type ProbeResult = Result<ProbeReport, ProbeError>;

/// What a server said during the handshake.
///
/// A report is produced whenever the handshake completed, including when the
/// server declined to offer any security type ([`SecurityOffer::Failure`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// The probed endpoint.
    pub endpoint: Endpoint,
    /// Version from the server banner.
    pub version: ProtocolVersion,
    /// Security types offered, or the reason none were.
    pub offer: SecurityOffer,
}

impl ProbeReport {
    /// The server's rejection reason, if it offered no security types.
    pub fn rejection_reason(&self) -> Option<&str> {
        self.offer.failure_reason()
    }

    /// Whether the server declined the connection.
    pub fn is_rejected(&self) -> bool {
        self.rejection_reason().is_some()
    }

    /// Offered security types in server order (empty if rejected).
    pub fn security_types(&self) -> &[u8] {
        self.offer.types()
    }

    /// Names of the offered security types, in server order.
    pub fn security_type_names(&self) -> Vec<&'static str> {
        self.security_types()
            .iter()
            .map(|&id| security_type_name(id))
            .collect()
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.offer {
            SecurityOffer::Failure(reason) => write!(
                f,
                "{}: {} rejected connection: {}",
                self.endpoint, self.version, reason
            ),
            SecurityOffer::Types(types) => write!(
                f,
                "{}: {} offers security types {:?}",
                self.endpoint, self.version, types
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(offer: SecurityOffer) -> ProbeReport {
        ProbeReport {
            endpoint: Endpoint::new("nas", 5900),
            version: ProtocolVersion::V3_8,
            offer,
        }
    }

    #[test]
    fn test_accepted_report() {
        let r = report(SecurityOffer::Types(vec![2, 1]));
        assert!(!r.is_rejected());
        assert_eq!(r.security_types(), &[2, 1]);
        assert_eq!(r.security_type_names(), vec!["VNC Authentication", "None"]);
        assert_eq!(r.to_string(), "nas:5900: RFB 003.008 offers security types [2, 1]");
    }

    #[test]
    fn test_rejected_report() {
        let r = report(SecurityOffer::Failure("too many clients".to_string()));
        assert!(r.is_rejected());
        assert_eq!(r.rejection_reason(), Some("too many clients"));
        assert!(r.security_types().is_empty());
    }

    #[test]
    fn test_report_json() {
        let json = serde_json::to_value(report(SecurityOffer::Types(vec![1]))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "endpoint": {"host": "nas", "port": 5900},
                "version": {"major": 3, "minor": 8},
                "offer": {"kind": "types", "value": [1]}
            })
        );
    }
}
