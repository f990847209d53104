use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clipgrab_core::core::downloader::MediaDownloader;
use clipgrab_core::{Pipeline, PlatformRegistry};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod storage;

use commands::AppState;
use storage::config;
use storage::downloads::DownloadStore;

const DEFAULT_LOG_FILTER: &str = "info,clipgrab_core=info,clipgrab_lib=info";

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve()) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

pub async fn serve() -> anyhow::Result<()> {
    let settings = config::effective_settings();

    let store = DownloadStore::open(config::output_dir(&settings))
        .await
        .context("creating download directory")?;
    tracing::info!("Downloads are stored in {}", store.dir().display());

    let registry = Arc::new(PlatformRegistry::builtin());
    let pipeline = Pipeline::from_settings(registry, &settings);
    let downloader = MediaDownloader::from_settings(&settings, store.dir());
    tracing::info!("Download transports: {}", downloader.transport_names().join(", "));

    let state = AppState {
        pipeline: Arc::new(pipeline),
        downloader: Arc::new(downloader),
        store: Arc::new(store),
        settings_path: config::settings_path(),
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, commands::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }
}
