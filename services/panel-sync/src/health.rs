//! Connection health: backend reachability tracked apart from any data query

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::client::RequestClient;
use crate::polling::{PollingBinding, PollingDriver, Refreshable};

/// Default probe endpoint
pub const DEFAULT_HEALTH_ENDPOINT: &str = "/api/health";
/// Default interval between background probes
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Reachability as last observed by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    pub is_connected: bool,
    pub is_checking: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_checking: true,
        }
    }
}

/// Probes the backend on its own timer. Only the probe changes `is_connected`.
pub struct ConnectionHealthMonitor {
    client: RequestClient,
    endpoint: String,
    state: watch::Sender<HealthState>,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for ConnectionHealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHealthMonitor")
            .field("endpoint", &self.endpoint)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl ConnectionHealthMonitor {
    pub fn new(client: RequestClient, endpoint: impl Into<String>) -> Self {
        let (state, _) = watch::channel(HealthState::default());
        Self {
            client,
            endpoint: endpoint.into(),
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> HealthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.state.subscribe()
    }

    /// Probe now and return whether the backend answered successfully.
    ///
    /// Overlapping checks each write `is_connected` when they finish, last
    /// one wins; `is_checking` stays set until every check has finished.
    pub async fn check_now(&self) -> bool {
        self.state.send_modify(|s| {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            s.is_checking = true;
        });

        let connected = match self.client.probe(&self.endpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Health probe {} failed: {}", self.endpoint, e);
                false
            }
        };

        // the watch lock serializes these closures, keeping counter and flag in step
        let mut was_connected = connected;
        self.state.send_modify(|s| {
            let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            was_connected = s.is_connected;
            *s = HealthState {
                is_connected: connected,
                is_checking: remaining > 0,
            };
        });
        if was_connected != connected {
            if connected {
                tracing::info!("Backend connected");
            } else {
                tracing::warn!("Backend unreachable");
            }
        }
        connected
    }

    /// Probe once now, then every `interval` until the binding is cancelled
    pub fn activate(self: &Arc<Self>, interval: Duration) -> PollingBinding {
        PollingDriver::attach_eager(Arc::clone(self) as Arc<dyn Refreshable>, interval)
    }
}

#[async_trait]
impl Refreshable for ConnectionHealthMonitor {
    fn name(&self) -> &str {
        "health"
    }

    async fn refresh(&self) {
        self.check_now().await;
    }
}
