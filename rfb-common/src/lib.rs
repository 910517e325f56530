//! Common types shared by the RFB prober crates.
//!
//! - [`Endpoint`] - host and port of a remote RFB server
//! - [`DEFAULT_PORT`] - the well-known RFB port (display :0)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default RFB port (display :0).
pub const DEFAULT_PORT: u16 = 5900;

/// Highest value treated as a display number rather than a port in `host:N`.
const MAX_DISPLAY_NUMBER: u16 = 99;

/// Error returned when an endpoint string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    /// The host part is empty.
    #[error("host cannot be empty")]
    EmptyHost,
    /// The part after the last `:` is not a valid port or display number.
    #[error("invalid port or display number: {0:?}")]
    InvalidPort(String),
    /// A bracketed IPv6 literal is missing its closing `]`.
    #[error("unterminated IPv6 literal: {0:?}")]
    UnterminatedIpv6(String),
}

/// A remote RFB server address.
///
/// The host may be a DNS name or a literal IPv4/IPv6 address. Endpoints are
/// plain values; nothing is resolved until a connection is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Endpoint {
    /// Create an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Create an endpoint on the default RFB port.
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    /// Address string suitable for `TcpStream::connect`.
    ///
    /// IPv6 literals are wrapped in brackets.
    pub fn socket_addr_string(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.socket_addr_string())
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parse `host`, `host:port`, `host:display` or `[v6]:port`.
    ///
    /// Numbers up to 99 after the colon are VNC display numbers
    /// (`:1` is port 5901); larger numbers are ports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| EndpointParseError::UnterminatedIpv6(s.to_string()))?;
            if host.is_empty() {
                return Err(EndpointParseError::EmptyHost);
            }
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port_or_display(p)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(EndpointParseError::InvalidPort(tail.to_string())),
            };
            return Ok(Self::new(host, port));
        }

        // A bare IPv6 literal has more than one colon and no port.
        if s.matches(':').count() > 1 {
            return Ok(Self::with_default_port(s));
        }

        let (host, port) = match s.split_once(':') {
            Some((host, p)) => (host, parse_port_or_display(p)?),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost);
        }
        Ok(Self::new(host, port))
    }
}

fn parse_port_or_display(s: &str) -> Result<u16, EndpointParseError> {
    let num = s
        .parse::<u16>()
        .map_err(|_| EndpointParseError::InvalidPort(s.to_string()))?;
    if num <= MAX_DISPLAY_NUMBER {
        Ok(DEFAULT_PORT + num)
    } else {
        Ok(num)
    }
}
