//! njalld: the Njall daemon.
//!
//! Serves the built-in message service over gRPC and HTTP until interrupted.

use clap::Parser;
use tracing::{error, info};

use njall::server::{Config, Server};

/// Njall daemon: gRPC and HTTP request dispatch for LarpConnect.
#[derive(Parser)]
#[command(name = "njalld")]
#[command(version = njall::PKG_VERSION)]
#[command(about = "Njall request-handling daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default to info for the daemon; override with RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let settings = config.validate()?;

    info!(version = njall::version_string(), "njalld starting");

    let server = Server::start(settings).await.inspect_err(|e| {
        error!(error = %e, "Startup failed");
    })?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Cannot listen for shutdown signal");
            }
        })
        .await?;

    Ok(())
}
