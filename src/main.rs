mod api;
mod app;
mod cli;
mod client;
mod clipboard;
mod config;
mod events;
mod extract;
mod http;
mod models;
mod prompt;
mod relay;
mod state;
mod tokens;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let filter = match cli.verbose {
        0 => "warn,animgen=info",
        1 => "info,animgen=debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { bind } => {
            let config = config::load_config(cli.config.as_deref())?;
            let config = config::apply_env_overrides(config);
            let addr = bind.unwrap_or_else(|| config.bind_address.clone());

            let state = AppState::from_config(&config)?;
            if !state.backend.health_check().await {
                tracing::warn!(url = %config.ollama_url, "model backend is not reachable yet");
            }

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;

            tracing::info!(
                addr = %addr,
                model = %config.default_model,
                upstream = %config.ollama_url,
                "relay listening"
            );

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("relay stopped");
        }
        Commands::Generate(args) => cli::generate(args).await?,
        Commands::Improve { prompt, server } => cli::improve(prompt, &server).await?,
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
