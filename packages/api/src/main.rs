use std::net::SocketAddr;
use std::sync::Arc;

use pccc_api::{build_router, AppConfig, AppState};
use pccc_compliance::{ComplianceAnalyzer, ComplianceConfig, OpenRouterClient};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let compliance_config = match ComplianceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    let app_config = AppConfig::from_env();

    let client = match OpenRouterClient::new(&compliance_config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to create LLM client");
            std::process::exit(1);
        }
    };

    let analyzer = match ComplianceAnalyzer::new(Arc::new(client), &compliance_config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            tracing::error!(error = %e, "failed to create analyzer");
            std::process::exit(1);
        }
    };

    tracing::info!(
        model = %compliance_config.model,
        mode = %analyzer.mode(),
        origins = ?app_config.cors_origins,
        "compliance analyzer ready"
    );

    let state = AppState {
        analyzer: Arc::new(analyzer),
    };
    let app = build_router(state, &app_config);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to bind on {addr}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    tracing::info!("server stopped");
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, only SIGINT will stop the server");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
