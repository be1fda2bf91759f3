pub mod scheduler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::daemon::scheduler::{SweepScheduler, SystemClock};
use crate::mailer::build_mailer;
use crate::models::{CollectorConfig, StorageBackend};
use crate::server::{self, AppState};
use crate::sources::{http_client, AdzunaSource, JobSource, ReedSource};
use crate::storage::{MemoryStore, SqliteStore, Store};

const APP_DIR: &str = "job-collector";
const DB_FILE: &str = "jobc.db";

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn read_config(path: &Path) -> Result<CollectorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: CollectorConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    tracing::info!("Loaded config from: {}", path.display());
    Ok(config)
}

/// Load the CollectorConfig. Resolution order:
///   1. `--config` path (must exist)
///   2. `JOBC_CONFIG_DIR`/config.json
///   3. platform config dir, `job-collector/config.json`
///   4. `{data_dir}/config.json`
///   5. defaults
pub fn load_config(config_path: Option<&Path>) -> Result<CollectorConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            return read_config(path);
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("JOBC_CONFIG_DIR") {
        let path = PathBuf::from(&config_dir).join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(APP_DIR).join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    let path = resolve_data_dir(None).join("config.json");
    if path.exists() {
        return read_config(&path);
    }

    tracing::info!("No config file found, using defaults");
    Ok(CollectorConfig::default())
}

/// Resolve the data directory: explicit override, then `JOBC_DATA_DIR`, then
/// the platform data dir (`~/.local/share/job-collector` on Linux).
pub fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Ok(d) = std::env::var("JOBC_DATA_DIR") {
        return PathBuf::from(d);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

// ---------------------------------------------------------------------------
// Component construction
// ---------------------------------------------------------------------------

pub fn build_store(config: &CollectorConfig, data_dir: &Path) -> Result<Arc<dyn Store>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = data_dir.join(DB_FILE);
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            tracing::info!("Using SQLite storage at {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

/// Providers with credentials configured. A provider without credentials is
/// skipped with a warning.
pub fn build_sources(
    config: &CollectorConfig,
    client: &reqwest::Client,
) -> Vec<Arc<dyn JobSource>> {
    let mut sources: Vec<Arc<dyn JobSource>> = Vec::new();

    match config.reed.api_key {
        Some(ref key) => sources.push(Arc::new(ReedSource::new(
            client.clone(),
            key,
            config.reed.results_to_take,
        ))),
        None => tracing::warn!("REED_API_KEY not set; reed source disabled"),
    }

    match (&config.adzuna.app_id, &config.adzuna.app_key) {
        (Some(id), Some(key)) => sources.push(Arc::new(AdzunaSource::new(
            client.clone(),
            id,
            key,
            &config.adzuna.country,
            config.adzuna.results_per_page,
        ))),
        _ => tracing::warn!("ADZUNA_APP_ID/ADZUNA_APP_KEY not set; adzuna source disabled"),
    }

    sources
}

// ---------------------------------------------------------------------------
// Daemon bootstrap
// ---------------------------------------------------------------------------

/// Run the collector daemon until Ctrl+C or SIGTERM.
///
/// Loads and validates config, opens the store, wires the pipeline into the
/// HTTP router, and starts the sweep scheduler when one is configured.
pub async fn start_daemon(
    config_path: Option<&Path>,
    data_dir_override: Option<&Path>,
    host_override: Option<&str>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.apply_env_overrides(|k| std::env::var(k).ok());

    if let Some(h) = host_override {
        config.host = h.to_string();
    }
    if let Some(p) = port_override {
        config.port = p;
    }

    let data_dir = if let Some(d) = data_dir_override {
        d.to_path_buf()
    } else if let Some(ref d) = config.data_dir {
        d.clone()
    } else {
        resolve_data_dir(None)
    };
    config.data_dir = Some(data_dir.clone());
    config.validate().context("Invalid configuration")?;

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let store = build_store(&config, &data_dir)?;
    let client = http_client(config.http_timeout_secs)?;
    let sources = build_sources(&config, &client);
    let mailer = build_mailer(&config.mail, client)?;

    let config = Arc::new(config);
    let state = Arc::new(AppState::new(
        store,
        sources,
        mailer,
        Arc::clone(&config),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    let scheduler_handle = match config.sweep_schedule {
        Some(ref schedule) => {
            let scheduler = SweepScheduler::new(
                state.notifier.clone(),
                schedule,
                config.sweep_timezone.as_deref(),
                Arc::new(SystemClock),
            );
            let rx = shutdown_rx.clone();
            tracing::info!("Sweep scheduled with '{}'", schedule);
            Some(tokio::spawn(async move {
                if let Err(e) = scheduler.run(rx).await {
                    tracing::error!("Scheduler error: {}", e);
                }
            }))
        }
        None => None,
    };

    let router = server::create_router(Arc::clone(&state));
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Collector listening on http://{}", bind_addr);

    let mut server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                server_shutdown.changed().await.ok();
                tracing::info!("HTTP server received shutdown signal");
            })
            .await
            .ok();
    });

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM signal");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C signal");
    }

    let _ = shutdown_tx.send(());
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    let _ = server_handle.await;

    tracing::info!("Collector exited cleanly.");
    Ok(())
}
