//! `blobgated`: runs the blob-store frontend as a standalone daemon.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use blobgate_server::{ConfigLoader, Server};

/// blobgate's HTTP-facing frontend: accepts client requests, converts blob
/// ids, enforces the security gate, and fans requests out to replicas
/// through the router.
#[derive(Parser)]
#[command(name = "blobgated")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Overrides built-in defaults;
    /// `BLOBGATE_*` environment variables take precedence over both.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error. Overridden by `RUST_LOG`
    /// if set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    #[cfg(unix)]
    if let Err(e) = server.shutdown_handle().install_signal_handlers() {
        error!(error = %e, "failed to install signal handlers, shutdown must be forced");
    }

    info!("blobgate starting");
    match server.run() {
        Ok(()) => {
            info!("blobgate stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
