//! Rendering of probe results and the exit-code policy.

use rfb_common::Endpoint;
use rfb_prober::{ProbeError, ProbeResult};
use rfb_protocol::SecurityOffer;
use serde_json::{json, Value};
use std::fmt::Write;

/// Exit code when every probe got security types (or exit codes are off).
pub const EXIT_OK: u8 = 0;
/// The server could not be reached or dropped the connection.
pub const EXIT_CONNECTION: u8 = 1;
/// The server did not speak RFB.
pub const EXIT_FRAMING: u8 = 2;
/// The server completed the handshake but offered no security types.
pub const EXIT_REJECTED: u8 = 3;

/// Human-readable lines for one probe.
pub fn render_text(endpoint: &Endpoint, result: &ProbeResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Testing VNC connection to {}", endpoint);

    match result {
        Ok(report) => {
            let _ = writeln!(out, "Server version: {}", report.version);
            match &report.offer {
                SecurityOffer::Failure(reason) => {
                    let _ = writeln!(out, "Number of security types: 0");
                    let _ = writeln!(out, "Connection failed: {}", reason);
                }
                SecurityOffer::Types(types) => {
                    let _ = writeln!(out, "Number of security types: {}", types.len());
                    let _ = writeln!(
                        out,
                        "Security types: {:?} ({})",
                        types,
                        report.security_type_names().join(", ")
                    );
                }
            }
        }
        Err(e) if e.is_timeout() => {
            let _ = writeln!(out, "Connection timed out");
        }
        Err(e) => {
            let _ = writeln!(out, "Error: {}", e);
        }
    }
    out
}

/// One JSON object for one probe.
pub fn render_json(endpoint: &Endpoint, result: &ProbeResult) -> Value {
    match result {
        Ok(report) => {
            let status = if report.is_rejected() { "rejected" } else { "ok" };
            json!({
                "endpoint": endpoint,
                "status": status,
                "version": report.version.to_string(),
                "offer": report.offer,
                "security_type_names": report.security_type_names(),
            })
        }
        Err(e) => json!({
            "endpoint": endpoint,
            "status": "error",
            "error": {
                "kind": error_kind(e),
                "message": e.to_string(),
                "timeout": e.is_timeout(),
            },
        }),
    }
}

fn error_kind(err: &ProbeError) -> &'static str {
    match err {
        ProbeError::Connection(_) => "connection",
        ProbeError::Framing(_) => "framing",
        ProbeError::Config(_) => "config",
        ProbeError::Internal(_) => "internal",
    }
}

/// Exit code for a single outcome.
pub fn exit_code(result: &ProbeResult) -> u8 {
    match result {
        Ok(report) if report.is_rejected() => EXIT_REJECTED,
        Ok(_) => EXIT_OK,
        Err(ProbeError::Framing(_)) => EXIT_FRAMING,
        Err(_) => EXIT_CONNECTION,
    }
}

/// Exit code for a run: the code of the first unsuccessful probe in input
/// order, or 0. Always 0 unless `distinct` is set.
pub fn run_exit_code<'a, I>(results: I, distinct: bool) -> u8
where
    I: IntoIterator<Item = &'a ProbeResult>,
{
    if !distinct {
        return EXIT_OK;
    }
    results
        .into_iter()
        .map(exit_code)
        .find(|&code| code != EXIT_OK)
        .unwrap_or(EXIT_OK)
}
