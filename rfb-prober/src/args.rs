//! Command-line argument parsing for probe tools.
//!
//! This module is only available when the `cli` feature is enabled.
//! It parses command-line arguments and converts them into a `Config`.
//!
//! # Examples
//!
//! ```no_run
//! use rfb_prober::args::Args;
//! use rfb_prober::Config;
//!
//! let args = Args::parse();
//! let config = Config::from_args(&args)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{Config, TlsSettings};
use crate::errors::ProbeError;
use clap::Parser;
use rfb_common::Endpoint;
use std::path::PathBuf;

/// RFB handshake prober command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Probe RFB (VNC) servers for their protocol version and security types", long_about = None)]
pub struct Args {
    /// VNC server address (host, host:port or host:display)
    ///
    /// Examples:
    ///   - 192.168.178.70 (port 5900)
    ///   - nas.local:1 (display :1 = port 5901)
    ///   - [::1]:5999
    #[arg(value_name = "SERVER")]
    pub server: Option<String>,

    /// Server port (overrides the port in SERVER)
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,

    /// Whole-handshake timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS", env = "RFB_PROBE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrent probes
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Connect through TLS
    #[arg(long)]
    pub tls: bool,

    /// Additional CA certificate file (PEM format)
    #[arg(long, value_name = "FILE", requires = "tls")]
    pub tls_ca: Option<PathBuf>,

    /// Disable TLS certificate verification (insecure)
    #[arg(long, requires = "tls")]
    pub tls_insecure: bool,

    /// Print one JSON object per endpoint instead of text
    #[arg(long)]
    pub json: bool,

    /// Exit with 1 (connection failure), 2 (framing error) or 3 (rejected)
    #[arg(long)]
    pub exit_codes: bool,

    /// Enable verbose logging (repeat for more)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// The endpoint named on the command line, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the server address cannot be parsed.
    pub fn endpoint(&self) -> Result<Option<Endpoint>, ProbeError> {
        let Some(server) = &self.server else {
            return Ok(None);
        };
        let mut endpoint: Endpoint = server
            .parse()
            .map_err(|e| ProbeError::Config(format!("Invalid server address '{}': {}", server, e)))?;
        if let Some(port) = self.port {
            endpoint.port = port;
        }
        Ok(Some(endpoint))
    }
}

impl Config {
    /// Create a configuration from command-line arguments.
    ///
    /// If a config file is specified it is loaded first, then overridden by
    /// explicit command-line arguments. A server given on the command line
    /// replaces the file's targets.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The server address is invalid
    /// - No server is given and the config file lists no targets
    /// - The configuration validation fails
    pub fn from_args(args: &Args) -> Result<Self, ProbeError> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(endpoint) = args.endpoint()? {
            config.targets = vec![endpoint];
        }
        if config.targets.is_empty() {
            return Err(ProbeError::Config(
                "No server given and no targets in config file".to_string(),
            ));
        }

        if let Some(ms) = args.timeout_ms {
            config.probe.timeout_ms = ms;
        }
        if let Some(n) = args.concurrency {
            config.probe.concurrency = n;
        }

        if args.tls {
            let tls = config.tls.get_or_insert_with(TlsSettings::default);
            tls.enabled = true;
            if args.tls_insecure {
                tls.danger_accept_invalid_certs = true;
            }
            if let Some(ca) = &args.tls_ca {
                tls.ca_file = Some(ca.clone());
            }
        }

        config.validate()?;
        Ok(config)
    }
}
