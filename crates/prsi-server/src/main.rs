//! `prsi-server`: runs a Prsi server until SIGINT or SIGTERM.

mod cli;
mod logging;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use prsi::PrsiServer;

use crate::cli::Cli;
use crate::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::resolve(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("prsi-server: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logging);

    let mut builder = PrsiServer::builder().config(settings.server);
    if let Some(seed) = cli.seed {
        builder = builder.rng_seed(seed);
    }

    let server = match builder.build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "could not start the server");
            return ExitCode::FAILURE;
        }
    };

    match server.run_until(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

/// Completes on the first SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                tracing::warn!("signal handlers unavailable, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
}
