//! The handshake prober.
//!
//! One probe connects, reads the server banner, answers with the client
//! banner, reads the security offer and closes the connection. A single
//! deadline, fixed when the call starts, bounds every step.
//!
//! Deadline expiry is classified by step: while connecting or writing it is
//! a [`ProbeError::Connection`] with [`TimedOut`](std::io::ErrorKind::TimedOut);
//! while waiting for server bytes it is a [`ProbeError::Framing`] short read
//! naming the field being read, the same as the server closing the stream
//! early.

use crate::config::Config;
use crate::errors::ProbeError;
use crate::report::{ProbeReport, ProbeResult};
use crate::transport::{TlsConfig, Transport};
use futures::stream::{self, StreamExt};
use rfb_common::Endpoint;
use rfb_protocol::handshake::{
    read_security_offer_until, read_server_version, send_client_version,
};
use rfb_protocol::FramingError;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Options for a single probe.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Whole-handshake timeout. Must be non-zero.
    pub timeout: Duration,
    /// TLS settings; plain TCP when `None`.
    pub tls: Option<TlsConfig>,
}

impl ProbeOptions {
    /// Plain TCP probe with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, tls: None }
    }

    /// Probe through TLS.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// A reusable, stateless prober.
///
/// Cloning is cheap and probes never share state, so one `Prober` can be
/// used from many tasks at once.
///
/// # Examples
///
/// ```no_run
/// use rfb_common::Endpoint;
/// use rfb_prober::{Config, Prober};
///
/// # async fn example() -> Result<(), rfb_prober::ProbeError> {
/// let prober = Prober::from_config(&Config::default())?;
/// let report = prober.probe(&Endpoint::new("192.168.178.70", 5900)).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Prober {
    options: ProbeOptions,
    concurrency: usize,
}

impl Prober {
    /// Creates a prober from options, probing one endpoint at a time in
    /// [`probe_all`](Self::probe_all).
    #[must_use]
    pub fn new(options: ProbeOptions) -> Self {
        Self {
            options,
            concurrency: 1,
        }
    }

    /// Creates a prober from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or its TLS settings
    /// cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, ProbeError> {
        config.validate()?;
        let options = ProbeOptions {
            timeout: config.timeout(),
            tls: config.transport_tls()?,
        };
        Ok(Self {
            options,
            concurrency: config.probe.concurrency,
        })
    }

    /// Sets how many probes [`probe_all`](Self::probe_all) keeps in flight.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The options every probe uses.
    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Probes one endpoint.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        probe_with(endpoint, &self.options).await
    }

    /// Probes every endpoint, keeping up to the configured concurrency in
    /// flight. Results come back in input order.
    pub async fn probe_all<I>(&self, endpoints: I) -> Vec<(Endpoint, ProbeResult)>
    where
        I: IntoIterator<Item = Endpoint>,
    {
        stream::iter(endpoints)
            .map(|endpoint| async move {
                let result = self.probe(&endpoint).await;
                (endpoint, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// Probes `endpoint` over plain TCP, bounding the whole handshake by `timeout`.
///
/// # Examples
///
/// ```no_run
/// use rfb_common::Endpoint;
/// use std::time::Duration;
///
/// # async fn example() {
/// match rfb_prober::probe(&Endpoint::new("localhost", 5900), Duration::from_secs(5)).await {
///     Ok(report) if report.is_rejected() => println!("rejected: {:?}", report.rejection_reason()),
///     Ok(report) => println!("security types: {:?}", report.security_types()),
///     Err(e) => println!("probe failed: {}", e),
/// }
/// # }
/// ```
pub async fn probe(endpoint: &Endpoint, timeout: Duration) -> ProbeResult {
    probe_with(endpoint, &ProbeOptions::new(timeout)).await
}

/// Probes `endpoint` with explicit options.
pub async fn probe_with(endpoint: &Endpoint, options: &ProbeOptions) -> ProbeResult {
    if options.timeout.is_zero() {
        return Err(ProbeError::Config("Timeout must be greater than 0".to_string()));
    }
    if endpoint.host.trim().is_empty() {
        return Err(ProbeError::Config("Host cannot be empty".to_string()));
    }

    let started = Instant::now();
    let deadline = started + options.timeout;
    tracing::debug!("Probing {} (timeout {:?})", endpoint, options.timeout);

    let result = run_handshake(endpoint, options, deadline).await;

    match &result {
        Ok(report) => tracing::debug!("{} in {:?}", report, started.elapsed()),
        Err(e) => tracing::debug!("Probe of {} failed after {:?}: {}", endpoint, started.elapsed(), e),
    }
    result
}

async fn run_handshake(
    endpoint: &Endpoint,
    options: &ProbeOptions,
    deadline: Instant,
) -> ProbeResult {
    // 1) Transport
    let transport = timeout_at(deadline, Transport::connect(endpoint, options.tls.as_ref()))
        .await
        .map_err(|_| ProbeError::timed_out("connect", options.timeout))??;
    let (mut input, mut output) = transport.split();

    // 2) Server banner
    let banner = timeout_at(deadline, read_server_version(&mut input)).await;
    let version = match banner {
        Ok(result) => result?,
        Err(_) => {
            return Err(FramingError::ShortBanner {
                received: input.available(),
            }
            .into())
        }
    };
    if !version.is_standard() {
        tracing::debug!("{} announced non-standard version {}", endpoint, version);
    }

    // 3) Client banner
    timeout_at(deadline, send_client_version(&mut output))
        .await
        .map_err(|_| ProbeError::timed_out("sending client version", options.timeout))??;

    // 4-5) Security offer
    let offer = read_security_offer_until(&mut input, deadline).await?;

    // 6) Release. The halves close the socket when dropped; a polite
    // shutdown is attempted only while time remains.
    if let Err(e) = timeout_at(deadline, output.shutdown()).await.unwrap_or_else(|_| Ok(())) {
        tracing::trace!("Shutdown of {} failed: {}", endpoint, e);
    }

    Ok(ProbeReport {
        endpoint: endpoint.clone(),
        version,
        offer,
    })
}

/// Probes `endpoint` from synchronous code.
///
/// Runs the probe on a private single-threaded runtime, so it must not be
/// called from inside an async context.
///
/// # Errors
///
/// Besides the probe outcomes, returns [`ProbeError::Internal`] if the
/// runtime cannot be created.
pub fn probe_blocking(endpoint: &Endpoint, timeout: Duration) -> ProbeResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ProbeError::Internal(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(probe(endpoint, timeout))
}
