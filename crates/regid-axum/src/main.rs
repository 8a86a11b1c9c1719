#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::service::{AppState, router};
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry(config.log_format)?;

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        config.build_writer(),
        config.event_name.clone(),
        shutdown.clone(),
    );

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting registration service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            addr = %config.server_addr,
            max_attempts = config.retry.max_attempts,
            deadline = ?config.retry.deadline,
            on_batch_failure = %config.writer.on_batch_failure,
            "Starting registration service"
        );
    }
}

/// Resolves on Ctrl+C or SIGTERM after cancelling `shutdown`, which stops
/// in-flight allocations at their next retry round.
async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    shutdown.cancel();
}
