//! RFB (VNC) handshake prober.
//!
//! Connects to an RFB server, exchanges version banners, reads the list of
//! security types the server offers and hangs up. The result tells a caller
//! whether the server is reachable, speaks RFB, and how it wants clients to
//! authenticate, without ever authenticating.
//!
//! # Quick Start
//!
//! ```no_run
//! use rfb_common::Endpoint;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = Endpoint::new("192.168.178.70", 5900);
//!     let report = rfb_prober::probe(&endpoint, Duration::from_secs(5)).await?;
//!
//!     match report.rejection_reason() {
//!         Some(reason) => println!("rejected: {}", reason),
//!         None => println!("{} offers {:?}", report.version, report.security_types()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Outcomes
//!
//! A probe yields one of:
//! - a [`ProbeReport`] with security types - the server is ready for a client
//! - a [`ProbeReport`] with a rejection reason - the server talked, and said no
//! - [`ProbeError::Connection`] - the server could not be reached or hung up
//! - [`ProbeError::Framing`] - the peer does not speak RFB
//!
//! # Concurrency
//!
//! Probes are independent: each owns its connection, and a [`Prober`] holds
//! no mutable state. [`Prober::probe_all`] probes many endpoints with bounded
//! concurrency.
//!
//! # Safety
//!
//! This crate is `#![forbid(unsafe_code)]` and uses only safe Rust.

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod errors;
pub mod prober;
pub mod report;
pub mod transport;

// Optional CLI support
#[cfg(feature = "cli")]
pub mod args;

// Re-exports
pub use config::Config;
pub use errors::ProbeError;
pub use prober::{probe, probe_blocking, probe_with, ProbeOptions, Prober};
pub use report::{ProbeReport, ProbeResult};
pub use rfb_common::Endpoint;
pub use rfb_protocol::{FramingError, ProtocolVersion, SecurityOffer};
pub use transport::TlsConfig;
