//! Opt-in wire tracing, enabled with `RFB_PROBE_TRACE=1`.
//!
//! Events go to the `protocol_trace` target at INFO level so they show up
//! without raising the global log level.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};

static TRACE_ENABLED: Lazy<AtomicBool> = Lazy::new(|| {
    let on = std::env::var("RFB_PROBE_TRACE")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
        .unwrap_or(false);
    AtomicBool::new(on)
});

/// Whether wire tracing is on.
#[inline]
pub fn enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

/// Force tracing on or off, overriding the environment.
#[inline]
pub fn set_enabled(on: bool) {
    TRACE_ENABLED.store(on, Ordering::Relaxed)
}

/// Log a message sent to the server.
#[inline]
pub fn out_msg(name: &str, fields: &str) {
    if enabled() {
        tracing::info!(target: "protocol_trace", "OUT {} {}", name, fields);
    }
}

/// Log a message received from the server.
#[inline]
pub fn in_msg(name: &str, fields: &str) {
    if enabled() {
        tracing::info!(target: "protocol_trace", "IN  {} {}", name, fields);
    }
}

/// Dump up to `max` bytes of `data` as hex, each row prefixed by `prefix`.
pub fn hexdump(prefix: &str, data: &[u8], max: usize) {
    if !enabled() || data.is_empty() {
        return;
    }
    for line in hex_lines(&data[..max.min(data.len())]) {
        tracing::info!(target: "protocol_trace", "{}{}", prefix, line);
    }
}

/// Format bytes as rows of 16 space-separated hex pairs.
fn hex_lines(data: &[u8]) -> Vec<String> {
    use std::fmt::Write as _;
    data.chunks(16)
        .map(|chunk| {
            let mut line = String::new();
            for b in chunk {
                let _ = write!(line, " {:02X}", b);
            }
            line
        })
        .collect()
}
