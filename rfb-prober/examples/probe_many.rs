//! Probe several VNC servers at once and log what each one offers.
//!
//! Usage:
//!   cargo run --example probe_many -- localhost:5900 nas.local:1 10.0.0.5
//!
//! This example demonstrates:
//! - Parsing endpoints (host, host:port, host:display)
//! - Building a prober with bounded concurrency
//! - Telling rejections apart from probe failures

use rfb_prober::{Endpoint, ProbeOptions, Prober};
use std::env;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: probe_many <host>[:<port>] ...");
        eprintln!("Example: probe_many localhost:5900 nas.local:1");
        std::process::exit(1);
    }

    let endpoints = args
        .iter()
        .map(|s| s.parse::<Endpoint>())
        .collect::<Result<Vec<_>, _>>()?;

    let prober = Prober::new(ProbeOptions::new(Duration::from_secs(5))).with_concurrency(4);

    for (endpoint, result) in prober.probe_all(endpoints).await {
        match result {
            Ok(report) if report.is_rejected() => {
                warn!("{}", report);
            }
            Ok(report) => {
                info!(
                    "{} ({}) offers {}",
                    endpoint,
                    report.version,
                    report.security_type_names().join(", ")
                );
            }
            Err(e) => {
                error!("{}: {}", endpoint, e);
            }
        }
    }

    Ok(())
}
