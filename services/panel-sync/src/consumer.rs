//! Headless consumers: subscribe to a query and log what a display would show

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::polling::Refreshable;
use crate::query::{QueryState, ResourceQuery};
use crate::resources::{AccountInfo, Backend, ResourceKind};

/// Number of log lines a logs consumer asks for
pub const LOG_TAIL_LIMIT: usize = 100;

/// One-line description of a resource value
pub trait Summary {
    fn summary(&self) -> String;
}

impl<T> Summary for Vec<T> {
    fn summary(&self) -> String {
        match self.len() {
            1 => "1 item".to_string(),
            n => format!("{} items", n),
        }
    }
}

impl Summary for AccountInfo {
    fn summary(&self) -> String {
        format!("{} ({:.2} {})", self.name, self.balance, self.currency)
    }
}

/// Build the query for `kind`, start logging its transitions and return it
/// as a polling target
pub fn consumer_for(
    backend: &Backend,
    kind: ResourceKind,
    cancel: CancellationToken,
) -> Arc<dyn Refreshable> {
    match kind {
        ResourceKind::Servers => observe(backend.servers_query(), cancel),
        ResourceKind::Queue => observe(backend.queue_query(), cancel),
        ResourceKind::Monitors => observe(backend.monitors_query(), cancel),
        ResourceKind::Account => observe(backend.account_query(), cancel),
        ResourceKind::Logs => observe(backend.logs_query(LOG_TAIL_LIMIT), cancel),
    }
}

fn observe<K, T>(query: ResourceQuery<K, T>, cancel: CancellationToken) -> Arc<dyn Refreshable>
where
    K: PartialEq + Clone + Send + Sync + 'static,
    T: Summary + Clone + Send + Sync + 'static,
{
    let mut rx = query.subscribe();
    let name = query.name().to_string();

    tokio::spawn(async move {
        let mut last = None;
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = rx.borrow_and_update().clone();
                    last = describe(&name, &state, last);
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Stopped observing '{}'", name);
    });

    Arc::new(query)
}

/// Log a state transition; returns the summary now on display
fn describe<T: Summary>(
    name: &str,
    state: &QueryState<T>,
    last: Option<String>,
) -> Option<String> {
    if state.is_loading {
        tracing::debug!("'{}' loading", name);
        return last;
    }

    let current = state.data.as_ref().map(Summary::summary);
    if let Some(error) = &state.error {
        match &current {
            Some(summary) => {
                tracing::warn!("'{}' refresh failed: {} (showing {})", name, error, summary)
            }
            None => tracing::warn!("'{}' unavailable: {}", name, error),
        }
    } else if current != last {
        if let Some(summary) = &current {
            tracing::info!("'{}': {}", name, summary);
        }
    }
    current
}
