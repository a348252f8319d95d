use clap::Parser;
use nutanix_ops::cli::{self, Cli};
use nutanix_ops::prelude::Result;
use nutanix_ops::telemetry;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// The main entry point for the `ntnx` utility.
///
/// Prints the result document on stdout; logs go to stderr.
///
#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging.
    let subscriber = telemetry::get_subscriber(Level::INFO, std::io::stderr);
    telemetry::init_subscriber(subscriber)?;
    tracing::info!(target: "cli", "Logger ready.");

    let cli = Cli::parse();
    tracing::info!(target: "cli", ?cli, "Cli arguments parsed.");

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "cli", "Interrupt received, cancelling.");
            token.cancel();
        }
    });

    let result = cli::run(&cli, cancel).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    tracing::info!(target: "cli", failed = result.failed, changed = result.changed, "Invocation finished.");

    Ok(if result.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
