//! HTTP listener and graceful shutdown.

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use vidflow_core::Config;

/// Serve `app` until Ctrl+C or SIGTERM. `shutdown` is cancelled on the
/// signal so blocked completion waits return before connections drain.
pub async fn start_server(config: &Config, app: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;

    tracing::info!(
        %addr,
        provider = %config.provider_base_url(),
        provider_credentials = config.provider_credentials().is_some(),
        webhook_secret = config.provider_webhook_secret().is_some(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Shutting down");
            shutdown.cancel();
        })
        .await
        .context("Server error")
}

/// Name of the first termination signal received.
async fn wait_for_signal() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for Ctrl+C");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
