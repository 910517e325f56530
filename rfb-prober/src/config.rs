//! Configuration types for the RFB prober.
//!
//! A configuration can be built in code with [`Config::builder`] or loaded
//! from a TOML file:
//!
//! ```toml
//! [probe]
//! timeout_ms = 5000
//! concurrency = 8
//!
//! [tls]
//! enabled = true
//! danger_accept_invalid_certs = false
//!
//! [[targets]]
//! host = "192.168.178.70"
//!
//! [[targets]]
//! host = "nas.local"
//! port = 5901
//! ```

use crate::errors::ProbeError;
use crate::transport;
use rfb_common::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete prober configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Probe settings.
    #[serde(default)]
    pub probe: ProbeSettings,
    /// TLS settings; plain TCP when absent or disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
    /// Endpoints to probe.
    #[serde(default)]
    pub targets: Vec<Endpoint>,
}

/// Probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Whole-handshake timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum number of probes in flight when probing several targets.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_concurrency() -> usize {
    8
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            concurrency: default_concurrency(),
        }
    }
}

/// TLS settings for servers fronted by a TLS tunnel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Wrap the TCP stream in TLS.
    #[serde(default)]
    pub enabled: bool,
    /// Server name for SNI and certificate validation (defaults to the host).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Path to an additional CA certificate file (PEM).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    /// Skip certificate validation (DANGEROUS - use only for testing).
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or
    /// fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ProbeError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| ProbeError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ProbeError::Config(msg) => ProbeError::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Validates the configuration.
    ///
    /// Port 0 is accepted: probing it simply fails to connect.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.probe.timeout_ms == 0 {
            return Err(ProbeError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.probe.concurrency == 0 {
            return Err(ProbeError::Config(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        if let Some(target) = self.targets.iter().find(|t| t.host.trim().is_empty()) {
            return Err(ProbeError::Config(format!(
                "Target host cannot be empty (port {})",
                target.port
            )));
        }

        if let Some(tls) = &self.tls {
            if tls.server_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(ProbeError::Config(
                    "TLS server name cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Returns the whole-handshake timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }

    /// Returns the transport TLS configuration, if TLS is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA file cannot be read or contains no
    /// certificates.
    pub fn transport_tls(&self) -> Result<Option<transport::TlsConfig>, ProbeError> {
        let Some(tls) = self.tls.as_ref().filter(|t| t.enabled) else {
            return Ok(None);
        };

        let mut cfg = transport::TlsConfig::new();
        if tls.danger_accept_invalid_certs {
            cfg = cfg.disable_verification();
        }
        if let Some(name) = &tls.server_name {
            cfg = cfg.server_name(name.clone());
        }
        if let Some(path) = &tls.ca_file {
            for cert in transport::load_pem_certificates(path)? {
                cfg = cfg.add_root_certificate(cert);
            }
        }
        Ok(Some(cfg))
    }
}

/// Builder for creating a `Config`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the whole-handshake timeout.
    ///
    /// Sub-millisecond timeouts round up to one millisecond; a zero duration
    /// fails validation.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis();
        self.config.probe.timeout_ms = if ms == 0 && !timeout.is_zero() {
            1
        } else {
            u64::try_from(ms).unwrap_or(u64::MAX)
        };
        self
    }

    /// Sets the maximum number of concurrent probes.
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.probe.concurrency = concurrency;
        self
    }

    /// Adds an endpoint to probe.
    #[must_use]
    pub fn target(mut self, endpoint: Endpoint) -> Self {
        self.config.targets.push(endpoint);
        self
    }

    /// Sets the TLS settings.
    #[must_use]
    pub fn tls(mut self, tls: TlsSettings) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Config, ProbeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
