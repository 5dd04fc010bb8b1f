//! Observable query cells over one backend call

use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{ErrorInfo, RequestOutcome};
use crate::polling::Refreshable;

/// Snapshot of a query cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<ErrorInfo>,
}

impl<T> QueryState<T> {
    /// State of a freshly activated cell, before its first result
    pub fn loading() -> Self {
        Self {
            data: None,
            is_loading: true,
            error: None,
        }
    }
}

/// How overlapping refetches of one query are reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Every completion writes; whichever finishes last wins.
    LastWriterWins,
    /// Only the most recently started refetch may write.
    #[default]
    LatestRequestWins,
}

type FetchFn<K, T> = Arc<dyn Fn(K) -> BoxFuture<'static, RequestOutcome<T>> + Send + Sync>;

struct Tracking<K> {
    params: K,
    /// Bumped whenever `params` changes
    epoch: u64,
    /// Bumped on every refetch
    generation: u64,
}

struct Inner<K, T> {
    name: String,
    policy: StalePolicy,
    fetch: FetchFn<K, T>,
    tracking: Mutex<Tracking<K>>,
    state: watch::Sender<QueryState<T>>,
}

/// One backend resource as an observable `{data, is_loading, error}` cell.
///
/// Cloning is cheap and yields a handle to the same cell. Results fetched
/// under a parameter key that has since changed are never applied.
pub struct ResourceQuery<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for ResourceQuery<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T> std::fmt::Debug for ResourceQuery<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceQuery")
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<K, T> ResourceQuery<K, T>
where
    K: PartialEq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create the cell and start its first fetch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<F, Fut>(name: impl Into<String>, params: K, fetch: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
    {
        Self::with_policy(name, params, StalePolicy::default(), fetch)
    }

    pub fn with_policy<F, Fut>(
        name: impl Into<String>,
        params: K,
        policy: StalePolicy,
        fetch: F,
    ) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(QueryState::loading());
        let query = Self {
            inner: Arc::new(Inner {
                name: name.into(),
                policy,
                fetch: Arc::new(move |params| fetch(params).boxed()),
                tracking: Mutex::new(Tracking {
                    params,
                    epoch: 0,
                    generation: 0,
                }),
                state,
            }),
        };
        tracing::debug!("Activated query '{}'", query.inner.name);
        query.trigger();
        query
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn params(&self) -> K {
        self.lock().params.clone()
    }

    pub fn snapshot(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Switch to a new parameter key.
    ///
    /// Returns `false` and does nothing if `params` equals the current key.
    /// Otherwise resets the cell to its loading state and starts exactly one
    /// fetch for the new key.
    pub fn set_params(&self, params: K) -> bool {
        {
            let mut tracking = self.lock();
            if tracking.params == params {
                return false;
            }
            tracking.params = params;
            tracking.epoch += 1;
            self.inner.state.send_replace(QueryState::loading());
        }
        tracing::debug!("Parameters of query '{}' changed", self.inner.name);
        self.trigger();
        true
    }

    /// Start a refetch without waiting for it
    pub fn trigger(&self) {
        let query = self.clone();
        tokio::spawn(async move {
            let _ = query.refetch().await;
        });
    }

    /// Fetch again and write the result into the cell.
    ///
    /// Failures are captured into `error`; previous `data` is kept. The
    /// returned outcome is this call's own, so a manual refresh can await it
    /// even when the cell discarded the result as stale.
    pub async fn refetch(&self) -> RequestOutcome<()> {
        let (params, epoch, generation) = {
            let mut tracking = self.lock();
            tracking.generation += 1;
            self.inner.state.send_modify(|state| {
                state.is_loading = true;
                state.error = None;
            });
            (tracking.params.clone(), tracking.epoch, tracking.generation)
        };

        let outcome = (self.inner.fetch)(params).await;

        let tracking = self.lock();
        if tracking.epoch != epoch
            || (self.inner.policy == StalePolicy::LatestRequestWins
                && tracking.generation != generation)
        {
            tracing::debug!(
                "Discarding stale result for query '{}' (generation {} of {})",
                self.inner.name,
                generation,
                tracking.generation
            );
            return outcome.map(|_| ());
        }

        match outcome {
            Ok(data) => {
                self.inner.state.send_modify(|state| {
                    state.data = Some(data);
                    state.is_loading = false;
                    state.error = None;
                });
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Query '{}' failed: {}", self.inner.name, e);
                self.inner.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracking<K>> {
        self.inner
            .tracking
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<K, T> Refreshable for ResourceQuery<K, T>
where
    K: PartialEq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn refresh(&self) {
        let _ = self.refetch().await;
    }
}
