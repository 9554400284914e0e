//! Ask Me — upload documents, then ask questions answered by a local model.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use askme_chat::OllamaLlm;
use askme_core::AskMeConfig;
use askme_server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AskMeConfig::from_env().context("Invalid configuration")?;
    config
        .data_paths
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", config.data_paths.root.display()))?;
    info!("Data directory: {}", config.data_paths.root.display());

    let store = askme_store::open_store(&config)
        .await
        .context("Failed to open vector store")?;
    let embedder = askme_infer::create_embedder(&config.ollama)?;
    let llm = Arc::new(OllamaLlm::new(&config.ollama)?);
    info!(
        "Generation model {} at {}",
        config.ollama.model,
        config.ollama.base_url()
    );

    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, store.clone(), embedder, llm));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("[ ready ] http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = store.close().await {
        warn!("Closing vector store failed: {}", e);
    }
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
