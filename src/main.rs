//! `tranceloop`: generative trance session driver

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use tranceloop::cli::args::{Cli, OutputFormat};
use tranceloop::cli::commands;
use tranceloop::error::ExitCode;
use tranceloop::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();

    // First signal stops the session gracefully, the second exits at once.
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                None
            }
        };

        let first_is_term = tokio::select! {
            _ = tokio::signal::ctrl_c() => false,
            Some(()) = recv(sigterm.as_mut()) => true,
        };
        tracing::debug!(sigterm = first_is_term, "shutdown requested");

        eprintln!("\nStopping session... (press Ctrl+C again to force)");
        shutdown.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
            Some(()) = recv(sigterm.as_mut()) => std::process::exit(ExitCode::TERMINATED),
        }
    });

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn recv(sigterm: Option<&mut tokio::signal::unix::Signal>) -> Option<()> {
    match sigterm {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}
