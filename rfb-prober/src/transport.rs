//! Transport layer (TCP and TLS) for probe connections.
//!
//! Most RFB servers listen on plain TCP. Some deployments put a TLS tunnel
//! (stunnel, a reverse proxy) in front of the server; the handshake inside is
//! byte-for-byte the same, so the prober only needs a different stream.
//!
//! Connecting does not apply any timeout itself; the prober bounds the call
//! with its handshake deadline.
//!
//! # Examples
//!
//! ```no_run
//! use rfb_common::Endpoint;
//! use rfb_prober::transport::{Transport, TlsConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::new("localhost", 5900);
//! let plain = Transport::connect_tcp(&endpoint).await?;
//! let tls = Transport::connect_tls(&endpoint, &TlsConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

use crate::errors::ProbeError;
use rfb_common::Endpoint;
use rfb_protocol::io::{RfbInStream, RfbOutStream};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// TLS configuration for tunnelled RFB servers.
///
/// # Examples
///
/// ```
/// use rfb_prober::transport::TlsConfig;
///
/// // Use system root certificates (recommended)
/// let config = TlsConfig::default();
///
/// // Disable certificate verification (insecure, for testing only)
/// let insecure = TlsConfig::new().disable_verification();
/// ```
#[derive(Clone, Debug)]
pub struct TlsConfig {
    /// Verify server certificates (should always be true in production)
    pub verify_certificates: bool,
    /// Additional trusted roots (in addition to system roots)
    pub custom_roots: Vec<CertificateDer<'static>>,
    /// Name used for SNI and certificate validation instead of the host
    pub server_name: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsConfig {
    /// Create a new TLS configuration with secure defaults.
    ///
    /// Certificate verification is enabled by default.
    pub fn new() -> Self {
        Self {
            verify_certificates: true,
            custom_roots: Vec::new(),
            server_name: None,
        }
    }

    /// Disable certificate verification.
    ///
    /// # Security Warning
    ///
    /// This is **insecure** and should only be used for testing or development.
    pub fn disable_verification(mut self) -> Self {
        self.verify_certificates = false;
        self
    }

    /// Add a trusted root certificate (DER encoded).
    pub fn add_root_certificate(mut self, cert: CertificateDer<'static>) -> Self {
        self.custom_roots.push(cert);
        self
    }

    /// Override the server name used for SNI and verification.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    fn client_config(&self) -> Result<rustls::ClientConfig, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::Config(format!("TLS setup failed: {}", e)))?;

        if !self.verify_certificates {
            tracing::warn!("TLS certificate verification is DISABLED - insecure!");
            return Ok(builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
                .with_no_client_auth());
        }

        let mut root_store = RootCertStore::empty();
        let native_certs = rustls_native_certs::load_native_certs().map_err(|e| {
            ProbeError::Config(format!("Failed to load system certificates: {}", e))
        })?;
        let (added, ignored) = root_store.add_parsable_certificates(native_certs);
        tracing::debug!("Loaded {} system root certificates ({} ignored)", added, ignored);

        for cert in &self.custom_roots {
            root_store.add(cert.clone()).map_err(|e| {
                ProbeError::Config(format!("Invalid custom certificate: {}", e))
            })?;
        }

        Ok(builder
            .with_root_certificates(root_store)
            .with_no_client_auth())
    }
}

/// Read all certificates from a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no certificate.
pub fn load_pem_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ProbeError> {
    let read_error =
        |e: rustls_pki_types::pem::Error| ProbeError::Config(format!("Failed to read CA file '{}': {}", path.display(), e));

    let certs = CertificateDer::pem_file_iter(path)
        .map_err(read_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;

    if certs.is_empty() {
        return Err(ProbeError::Config(format!(
            "No certificates found in CA file '{}'",
            path.display()
        )));
    }
    Ok(certs)
}

/// Transport layer for probe connections.
///
/// Either a plain TCP connection or a TLS-encrypted one. Dropping the
/// transport (or the halves returned by [`split`](Self::split)) closes the
/// connection.
pub enum Transport {
    /// Plain TCP connection (unencrypted)
    Plain(TcpStream),
    /// TLS-encrypted connection
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Transport {
    /// Connect to an RFB server via plain TCP.
    ///
    /// TCP_NODELAY is enabled so the short handshake messages go out at once.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Connection`] if DNS resolution fails, the
    /// connection is refused or the network is unreachable.
    pub async fn connect_tcp(endpoint: &Endpoint) -> Result<Self, ProbeError> {
        Ok(Transport::Plain(open_tcp(endpoint).await?))
    }

    /// Connect to an RFB server through a TLS tunnel.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Connection`] if the TCP connection or the TLS
    /// handshake fails (including certificate verification), and
    /// [`ProbeError::Config`] if the TLS configuration cannot be built or the
    /// server name is invalid.
    pub async fn connect_tls(endpoint: &Endpoint, tls_config: &TlsConfig) -> Result<Self, ProbeError> {
        let config = tls_config.client_config()?;
        let connector = TlsConnector::from(Arc::new(config));

        let name = tls_config
            .server_name
            .clone()
            .unwrap_or_else(|| endpoint.host.clone());
        let server_name = ServerName::try_from(name.clone()).map_err(|e| {
            ProbeError::Config(format!("Invalid TLS server name '{}': {}", name, e))
        })?;

        let stream = open_tcp(endpoint).await?;
        let tls_stream = connector.connect(server_name, stream).await.map_err(|e| {
            ProbeError::Connection(io::Error::new(
                e.kind(),
                format!("TLS handshake with {} failed: {}", endpoint, e),
            ))
        })?;

        tracing::debug!("TLS established with {}", endpoint);
        Ok(Transport::Tls(Box::new(tls_stream)))
    }

    /// Connect using TLS when a configuration is given, plain TCP otherwise.
    ///
    /// # Errors
    ///
    /// See [`connect_tcp`](Self::connect_tcp) and [`connect_tls`](Self::connect_tls).
    pub async fn connect(endpoint: &Endpoint, tls: Option<&TlsConfig>) -> Result<Self, ProbeError> {
        match tls {
            Some(cfg) => Self::connect_tls(endpoint, cfg).await,
            None => Self::connect_tcp(endpoint).await,
        }
    }

    /// Whether the connection is TLS-encrypted.
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Split the transport into buffered input and output streams.
    pub fn split(self) -> (RfbInStream<TransportRead>, RfbOutStream<TransportWrite>) {
        match self {
            Transport::Plain(stream) => {
                let (read, write) = tokio::io::split(stream);
                (
                    RfbInStream::new(TransportRead::Plain(read)),
                    RfbOutStream::new(TransportWrite::Plain(write)),
                )
            }
            Transport::Tls(stream) => {
                let (read, write) = tokio::io::split(*stream);
                (
                    RfbInStream::new(TransportRead::Tls(read)),
                    RfbOutStream::new(TransportWrite::Tls(write)),
                )
            }
        }
    }
}

async fn open_tcp(endpoint: &Endpoint) -> Result<TcpStream, ProbeError> {
    let addr = endpoint.socket_addr_string();
    let stream = TcpStream::connect(&addr).await.map_err(|e| {
        ProbeError::Connection(io::Error::new(
            e.kind(),
            format!("Failed to connect to {}: {}", addr, e),
        ))
    })?;

    stream.set_nodelay(true).map_err(ProbeError::Connection)?;

    // Log local and remote addresses for correlation with server logs
    if let (Ok(local), Ok(peer)) = (stream.local_addr(), stream.peer_addr()) {
        tracing::info!("Connected via TCP: local={} -> remote={}", local, peer);
    } else {
        tracing::info!("Connected to {} via plain TCP", addr);
    }
    Ok(stream)
}

/// Read half of a transport (plain TCP or TLS).
pub enum TransportRead {
    /// Plain TCP read stream
    Plain(ReadHalf<TcpStream>),
    /// TLS read stream
    Tls(ReadHalf<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for TransportRead {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            TransportRead::Plain(stream) => std::pin::Pin::new(stream).poll_read(cx, buf),
            TransportRead::Tls(stream) => std::pin::Pin::new(stream).poll_read(cx, buf),
        }
    }
}

/// Write half of a transport (plain TCP or TLS).
pub enum TransportWrite {
    /// Plain TCP write stream
    Plain(WriteHalf<TcpStream>),
    /// TLS write stream
    Tls(WriteHalf<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncWrite for TransportWrite {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        match &mut *self {
            TransportWrite::Plain(stream) => std::pin::Pin::new(stream).poll_write(cx, buf),
            TransportWrite::Tls(stream) => std::pin::Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            TransportWrite::Plain(stream) => std::pin::Pin::new(stream).poll_flush(cx),
            TransportWrite::Tls(stream) => std::pin::Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        match &mut *self {
            TransportWrite::Plain(stream) => std::pin::Pin::new(stream).poll_shutdown(cx),
            TransportWrite::Tls(stream) => std::pin::Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Certificate verifier that accepts all certificates (INSECURE!).
///
/// This is only used when certificate verification is explicitly disabled.
#[derive(Debug)]
struct NoCertificateVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
