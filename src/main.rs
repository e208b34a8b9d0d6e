//! Wakamiti CLI - submit commands to a Wakamiti service and stream their progress.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wakamiti_cli::config::ConfigLoader;
use wakamiti_cli::display;

/// Exit code when no usable configuration was found.
const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Parser)]
#[command(
    name = "waka",
    about = "Run a command on a Wakamiti service and stream its progress",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Properties file to use instead of searching for wakamiti.properties.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Arguments sent to the service as the command line.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cancel `cancel` on the first Ctrl+C or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let endpoint = match loader.load() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            display::print_error(&e.to_string());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    tracing::debug!(%endpoint, "Configuration loaded");

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let code = wakamiti_cli::exec::run(&endpoint, &cli.args, cancel).await;
    std::process::exit(code);
}
