//! Realtime voice bridge server binary (C8 front-end plus process
//! lifecycle).
//!
//! Lifecycle shape (config -> build -> start -> run -> graceful stop) is
//! grounded on `call-engine/src/server.rs`'s `CallCenterServer`.

mod config;
mod logging;
mod ws;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use config::{Cli, ServerConfig, StartupError};
use voxbridge_core::{ServerContext, ToolRegistry};
use ws::AppState;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let server_config = match ServerConfig::from_cli(cli) {
        Ok(cfg) => cfg,
        Err(StartupError::MissingApiKey) => {
            eprintln!("fatal: {}", StartupError::MissingApiKey);
            std::process::exit(1);
        }
    };

    logging::init(&server_config.log_level);

    if let Err(err) = run(server_config).await {
        tracing::error!(error = %err, "server exited with a runtime error");
        std::process::exit(2);
    }
}

async fn run(server_config: ServerConfig) -> anyhow::Result<()> {
    let bind_addr = server_config.bind_addr();
    let ctx = ServerContext::new(server_config.bridge);

    let state = AppState { ctx: Arc::clone(&ctx), tools: ToolRegistry::new() };
    let app = ws::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "voxbridge-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!(active_calls = ctx.registry.active_count(), "shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received");
}
