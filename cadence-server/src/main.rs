use cadence_engine::MediaService;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod routes;
mod state;

use cli::CliArgs;
use config::AppConfig;
use error::AppError;
use state::AppState;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let dotenv = dotenvy::dotenv();
    let args = CliArgs::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);

    let _log_guard = logging::init_logging(args.verbose, &config.logging)?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment from .env"),
        Err(_) => info!("No .env file found, using process environment"),
    }

    let addr = config.listen_addr()?;
    let shutdown = CancellationToken::new();
    let service = MediaService::with_shutdown(
        config.extractor(),
        config.relay_config(),
        shutdown.clone(),
    )?;
    let router = routes::build_router(AppState::new(service), config.server.cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "cadence listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}
