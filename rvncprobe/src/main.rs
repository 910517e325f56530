mod output;

use anyhow::{Context, Result};
use rfb_prober::args::Args;
use rfb_prober::{Config, Prober};
use std::process::ExitCode;
use tracing::{debug, info};

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rvncprobe={0},rfb_prober={0},rfb_protocol={0},protocol_trace=info",
                    log_level
                )
                .into()
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(args.verbose);

    debug!("Starting rvncprobe {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_args(&args).context("Invalid configuration")?;
    let prober = Prober::from_config(&config).context("Failed to set up prober")?;
    info!(
        "Probing {} endpoint(s), timeout {:?}, concurrency {}",
        config.targets.len(),
        config.timeout(),
        config.probe.concurrency
    );

    let results = prober.probe_all(config.targets.clone()).await;

    for (endpoint, result) in &results {
        if args.json {
            println!("{}", output::render_json(endpoint, result));
        } else {
            print!("{}", output::render_text(endpoint, result));
        }
    }

    let code = output::run_exit_code(results.iter().map(|(_, r)| r), args.exit_codes);
    Ok(ExitCode::from(code))
}
