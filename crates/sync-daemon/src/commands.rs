//! Command implementations for the sync daemon.
//!
//! `run` starts the worker plus its metrics exporter, `serve` starts the
//! local indexing API, `status` queries a running worker's exporter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sync_client::{HttpClientConfig, HttpIndexingClient};
use sync_core::{
    Dispatcher, FileCheckpointStore, RetryPolicy, SyncMetrics, SyncWorker, WorkerConfig,
};
use sync_service::api::{self, ApiState};
use sync_service::exporter;
use sync_source::MongoChangeSource;
use sync_types::Settings;
use sync_vector::TfCosineStore;

/// Overrides accepted by the `run` command.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub mode: Option<String>,
    pub collection: Option<String>,
    pub checkpoint_dir: Option<String>,
}

fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Cancel the token on Ctrl+C or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if signal::ctrl_c().await.is_err() {
                warn!("Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => {
                    warn!("Failed to install SIGTERM handler");
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
        cancel.cancel();
    });
}

fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level_override {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Run the sync worker until interrupted.
///
/// Configuration or connection-string errors here are fatal: the daemon
/// exits instead of retrying a setup that cannot succeed.
pub async fn run_worker(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    overrides: RunOverrides,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level_override)?;
    if let Some(mode) = &overrides.mode {
        settings.mode = mode.parse().context("Invalid --mode")?;
    }
    if let Some(collection) = overrides.collection {
        settings.mongo_collection = collection;
    }
    if let Some(dir) = overrides.checkpoint_dir {
        settings.checkpoint_dir = dir;
    }
    init_logging(&settings.log_level)?;

    info!(
        collection = %settings.mongo_collection,
        mode = %settings.mode,
        api_base = %settings.api_base,
        checkpoint_dir = %settings.checkpoint_dir,
        "Sync worker starting"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let metrics = Arc::new(SyncMetrics::new());

    let store = Arc::new(
        FileCheckpointStore::open(settings.checkpoint_path())
            .context("Failed to open checkpoint store")?,
    );

    let source = MongoChangeSource::connect(
        &settings.mongo_uri,
        &settings.mongo_db,
        &settings.mongo_collection,
    )
    .await
    .context("Failed to connect to the change source")?;

    let mut client_config = HttpClientConfig::new(settings.api_base.clone())
        .with_timeout(Duration::from_secs(settings.request_timeout_secs));
    if let Some(token) = &settings.api_token {
        client_config = client_config.with_token(token.clone());
    }
    let client =
        HttpIndexingClient::new(client_config).context("Failed to build indexing client")?;

    let retry = RetryPolicy::new(
        Duration::from_millis(settings.backoff_base_ms),
        Duration::from_millis(settings.backoff_cap_ms),
        settings.max_attempts,
    )
    .with_jitter(true);

    let dispatcher = Dispatcher::new(
        Arc::new(client),
        store.clone(),
        settings.mongo_collection.clone(),
        retry,
        metrics.clone(),
        cancel.clone(),
    );

    let worker = SyncWorker::new(
        Arc::new(source),
        dispatcher,
        store,
        WorkerConfig::from_settings(&settings),
        metrics.clone(),
        cancel.clone(),
    );

    // Metrics exporter runs beside the worker and stops with it.
    let exporter_addr = settings.metrics_addr();
    let exporter_cancel = cancel.clone();
    let exporter_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = sync_service::serve(
            &exporter_addr,
            exporter::router(exporter_metrics),
            exporter_cancel,
        )
        .await
        {
            warn!(error = %e, "Metrics exporter stopped unexpectedly");
        }
    });

    worker.run().await.context("Worker failed")?;
    Ok(())
}

/// Serve the local indexing API.
pub async fn serve_api(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level_override)?;
    if let Some(port) = port_override {
        settings.http_port = port;
    }
    init_logging(&settings.log_level)?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let state = ApiState::new(Box::new(TfCosineStore::new()), settings.api_token.clone());

    info!(addr = %settings.http_addr(), "Indexing API starting");
    sync_service::serve(&settings.http_addr(), api::router(state), cancel)
        .await
        .context("API server failed")?;
    Ok(())
}

/// Query a running worker's health endpoint and print the result.
pub async fn show_status(config_path: Option<&str>) -> Result<()> {
    let settings = Settings::load(config_path).context("Failed to load configuration")?;

    // The exporter binds the configured host; 0.0.0.0 is not connectable.
    let host = if settings.http_host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        &settings.http_host
    };
    let url = format!("http://{}:{}/health", host, settings.metrics_port);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .context("Failed to build HTTP client")?;

    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            println!("Worker health ({}): {}", status, body);
        }
        Err(_) => {
            println!("Worker is not running (no response from {})", url);
        }
    }
    Ok(())
}
