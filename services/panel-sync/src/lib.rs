//! Panel Sync - resource synchronization core for the automation backend dashboard
//!
//! Turns backend calls into observable query cells, refreshes them on
//! per-consumer timers, tracks backend reachability on its own, and keeps
//! dependent fetches from applying stale answers.

pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod health;
pub mod io;
pub mod mutation;
pub mod notify;
pub mod order;
pub mod pipeline;
pub mod polling;
pub mod query;
pub mod resources;
pub mod settings;

pub use config::{load_config, Config};
pub use error::{ErrorInfo, ErrorKind, RequestOutcome, Result, SyncError};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::RequestClient;
use crate::health::ConnectionHealthMonitor;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::polling::PollingDriver;
use crate::resources::Backend;
use crate::settings::{ConfigProvider, FileSettingsStore};

/// Build a request client from the service configuration
pub fn build_client(
    config: &Config,
    http: Arc<dyn HttpClient>,
    settings: Arc<dyn ConfigProvider>,
) -> RequestClient {
    RequestClient::new(http, settings).with_timeouts(config.timeouts.to_timeouts())
}

/// Run the headless dashboard until ctrl-c
pub async fn run(config: Config) -> Result<()> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let settings: Arc<dyn ConfigProvider> =
        Arc::new(FileSettingsStore::new(config.settings_path.clone()));
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
        }
        cancel_for_signal.cancel();
    });

    run_until(&config, build_client(&config, http, settings), cancel).await
}

/// Activate the health monitor and every configured resource consumer, then
/// tear all timers down once `cancel` fires
pub async fn run_until(
    config: &Config,
    client: RequestClient,
    cancel: CancellationToken,
) -> Result<()> {
    let health_interval = Duration::from_secs(config.health.interval_seconds);
    if config.health.enabled && health_interval.is_zero() {
        return Err(SyncError::Config(
            "health interval_seconds must be greater than 0".to_string(),
        ));
    }
    if let Some(resource) = config
        .resources
        .iter()
        .find(|r| r.polling_interval().is_zero())
    {
        return Err(SyncError::Config(format!(
            "polling interval for '{}' must be greater than 0",
            resource.kind
        )));
    }

    let backend = Backend::new(client.clone());
    let mut bindings = Vec::new();

    if config.health.enabled {
        let monitor = Arc::new(ConnectionHealthMonitor::new(
            client,
            config.health.endpoint.clone(),
        ));
        bindings.push(monitor.activate(health_interval));
    }

    for resource in &config.resources {
        let target = consumer::consumer_for(&backend, resource.kind, cancel.clone());
        bindings.push(PollingDriver::attach(target, resource.polling_interval()));
    }

    tracing::info!(
        "Panel sync started: {} resources, health probe {}",
        config.resources.len(),
        if config.health.enabled { "on" } else { "off" }
    );

    cancel.cancelled().await;

    for binding in bindings {
        binding.shutdown().await;
    }
    tracing::info!("Panel sync stopped");
    Ok(())
}
