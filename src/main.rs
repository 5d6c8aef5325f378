use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gatekeeper::lifecycle::{wait_for_shutdown, Gatekeeper, Shutdown};
use gatekeeper::observability::init_logging;

const DEFAULT_CONFIG_PATH: &str = "/etc/gatekeeper/config.json";

#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about = "TLS gatekeeper for a single upstream")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let config_path = if cli.config.as_os_str().is_empty() {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    } else {
        cli.config
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");

    let gatekeeper = match Gatekeeper::from_config_file(&config_path) {
        Ok(gatekeeper) => gatekeeper,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        stop.trigger();
    });

    match gatekeeper.run(shutdown.subscribe()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
