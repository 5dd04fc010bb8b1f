//! Dependent field pipeline: a derived fetch over upstream selections with
//! stale-response suppression
//!
//! Every input change bumps the pipeline generation before anything else
//! happens. A fetch captures the generation it was started under and its
//! result is written only if that generation is still current, so a slow
//! answer for an old selection can never overwrite the answer for the
//! selection the user is looking at now.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{ErrorInfo, RequestOutcome};

/// Inputs of a dependent fetch
pub trait PipelineInputs: PartialEq + Clone + Send + Sync + 'static {
    /// Whether every input the derived fetch needs is present
    fn is_complete(&self) -> bool;
}

/// Generation marker captured when a derived fetch starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

/// Current inputs and derived value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState<I, V> {
    pub inputs: I,
    pub value: Option<V>,
    pub is_fetching: bool,
    /// Muted inline indicator; failures here are never sent to the notification sink
    pub last_error: Option<ErrorInfo>,
}

type DeriveFn<I, V> = Arc<dyn Fn(I) -> BoxFuture<'static, RequestOutcome<V>> + Send + Sync>;

struct Inner<I, V> {
    name: String,
    derive: DeriveFn<I, V>,
    generation: Mutex<u64>,
    state: watch::Sender<PipelineState<I, V>>,
}

/// Keeps a derived value in step with its inputs
pub struct DependentFieldPipeline<I, V> {
    inner: Arc<Inner<I, V>>,
}

impl<I, V> Clone for DependentFieldPipeline<I, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, V> std::fmt::Debug for DependentFieldPipeline<I, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependentFieldPipeline")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl<I, V> DependentFieldPipeline<I, V>
where
    I: PipelineInputs,
    V: Clone + Send + Sync + 'static,
{
    /// Create the pipeline. If `inputs` are already complete the derived
    /// fetch starts right away, which requires a Tokio runtime.
    pub fn new<F, Fut>(name: impl Into<String>, inputs: I, derive: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<V>> + Send + 'static,
    {
        let complete = inputs.is_complete();
        let (state, _) = watch::channel(PipelineState {
            inputs: inputs.clone(),
            value: None,
            is_fetching: false,
            last_error: None,
        });
        let pipeline = Self {
            inner: Arc::new(Inner {
                name: name.into(),
                derive: Arc::new(move |inputs| derive(inputs).boxed()),
                generation: Mutex::new(0),
                state,
            }),
        };
        if complete {
            let token = {
                let mut generation = pipeline.lock();
                *generation += 1;
                pipeline
                    .inner
                    .state
                    .send_modify(|state| state.is_fetching = true);
                FetchToken(*generation)
            };
            pipeline.start_with(token, inputs);
        }
        pipeline
    }

    pub fn snapshot(&self) -> PipelineState<I, V> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState<I, V>> {
        self.inner.state.subscribe()
    }

    pub fn inputs(&self) -> I {
        self.inner.state.borrow().inputs.clone()
    }

    pub fn current_token(&self) -> FetchToken {
        FetchToken(*self.lock())
    }

    pub fn is_current(&self, token: FetchToken) -> bool {
        *self.lock() == token.0
    }

    /// Change the inputs.
    ///
    /// Returns `None` if `change` left the inputs as they were. Otherwise the
    /// derived value is cleared and the generation advanced synchronously; if
    /// the new inputs are complete a derived fetch starts and its token is
    /// returned.
    pub fn update(&self, change: impl FnOnce(&mut I)) -> Option<FetchToken> {
        let (token, inputs) = {
            let mut generation = self.lock();
            let mut inputs = self.inner.state.borrow().inputs.clone();
            let before = inputs.clone();
            change(&mut inputs);
            if inputs == before {
                return None;
            }

            *generation += 1;
            let complete = inputs.is_complete();
            let for_fetch = inputs.clone();
            self.inner.state.send_modify(|state| {
                state.inputs = inputs;
                state.value = None;
                state.last_error = None;
                state.is_fetching = complete;
            });
            if !complete {
                return None;
            }
            (FetchToken(*generation), for_fetch)
        };

        self.start_with(token, inputs);
        Some(token)
    }

    fn start_with(&self, token: FetchToken, inputs: I) {
        tracing::debug!("Pipeline '{}' fetching ({:?})", self.inner.name, token);
        let pipeline = self.clone();
        let fetch = (self.inner.derive)(inputs);
        tokio::spawn(async move {
            let outcome = fetch.await;
            pipeline.complete(token, outcome);
        });
    }

    /// Apply a finished fetch. Returns whether it was current and written.
    pub fn complete(&self, token: FetchToken, outcome: RequestOutcome<V>) -> bool {
        let generation = self.lock();
        if *generation != token.0 {
            tracing::debug!(
                "Pipeline '{}' discarding stale result ({:?}, current {})",
                self.inner.name,
                token,
                *generation
            );
            return false;
        }

        match outcome {
            Ok(value) => self.inner.state.send_modify(|state| {
                state.value = Some(value);
                state.is_fetching = false;
                state.last_error = None;
            }),
            Err(e) => {
                tracing::debug!("Pipeline '{}' fetch failed: {}", self.inner.name, e);
                self.inner.state.send_modify(|state| {
                    state.is_fetching = false;
                    state.last_error = Some(e);
                });
            }
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
