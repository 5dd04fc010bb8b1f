//! Polling driver: recurring refresh timers scoped to a consumer's lifetime

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Something a timer can refresh
#[async_trait]
pub trait Refreshable: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Refresh once. Outcomes surface through the target's own state.
    async fn refresh(&self);
}

/// Attaches recurring timers to [`Refreshable`] targets
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingDriver;

impl PollingDriver {
    /// Refresh `target` every `interval`, first tick one interval from now.
    ///
    /// Each refresh runs detached, so a slow one never delays the next tick.
    /// A refresh already running when the binding is cancelled finishes; no
    /// new one starts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach(target: Arc<dyn Refreshable>, interval: Duration) -> PollingBinding {
        Self::spawn(target, interval, false)
    }

    /// Like [`PollingDriver::attach`], but refresh once immediately
    pub fn attach_eager(target: Arc<dyn Refreshable>, interval: Duration) -> PollingBinding {
        Self::spawn(target, interval, true)
    }

    fn spawn(target: Arc<dyn Refreshable>, interval: Duration, eager: bool) -> PollingBinding {
        let cancel = CancellationToken::new();
        let name = target.name().to_string();
        tracing::debug!("Attaching poller to '{}' every {:?}", name, interval);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            poll_loop(target, interval, eager, token).await;
        });

        PollingBinding {
            name,
            interval,
            cancel,
            handle: Some(handle),
        }
    }
}

async fn poll_loop(
    target: Arc<dyn Refreshable>,
    interval: Duration,
    eager: bool,
    cancel: CancellationToken,
) {
    let start = if eager {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Polling loop for '{}' cancelled", target.name());
                break;
            }
            _ = ticker.tick() => {}
        }

        // a cancel that raced the timer wins
        if cancel.is_cancelled() {
            break;
        }
        tracing::debug!("Poll tick for '{}'", target.name());

        // a slow refresh must not hold back the next tick
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            target.refresh().await;
        });
    }
}

/// A live polling timer. Cancelled on [`PollingBinding::cancel`] or drop.
#[derive(Debug)]
pub struct PollingBinding {
    name: String,
    interval: Duration,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollingBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the timer. Safe to call more than once.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Cancelling poller for '{}'", self.name);
            self.cancel.cancel();
        }
    }

    /// Cancel and wait for the timer task to finish
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollingBinding {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Holds at most one polling binding for a consumer.
///
/// Activating again replaces, and cancels, the previous binding.
#[derive(Debug, Default)]
pub struct ConsumerScope {
    binding: Option<PollingBinding>,
}

impl ConsumerScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, target: Arc<dyn Refreshable>, interval: Duration) {
        self.deactivate();
        self.binding = Some(PollingDriver::attach(target, interval));
    }

    pub fn activate_eager(&mut self, target: Arc<dyn Refreshable>, interval: Duration) {
        self.deactivate();
        self.binding = Some(PollingDriver::attach_eager(target, interval));
    }

    pub fn deactivate(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.binding.is_some()
    }
}
