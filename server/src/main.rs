mod app;
mod config;
mod i18n;
mod legend;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use legend_shared::LayerConfig;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let state = AppState::new();

    let layers_path = config::layers_path();
    let configs = read_layer_configs(&layers_path);
    tracing::info!(count = configs.len(), path = %layers_path, "registering layers");
    for config in configs {
        state.register_layer(config);
    }

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Legend server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

/// Reads the layer list; a missing or malformed file leaves the legend empty.
fn read_layer_configs(path: &str) -> Vec<LayerConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(%path, "no layer file found; starting with an empty legend");
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(error = %e, %path, "failed to read layer file");
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(configs) => configs,
        Err(e) => {
            tracing::error!(error = %e, %path, "failed to parse layer file");
            Vec::new()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
