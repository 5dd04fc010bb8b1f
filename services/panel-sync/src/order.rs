//! Order flow: product → location → add-ons with a live price preview
//!
//! Available locations depend on the product and the price depends on all
//! three selections. Both derived values discard answers for selections the
//! user has already moved away from. The price preview is best effort; only
//! the order submission itself reports to the notification sink.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ErrorInfo, RequestOutcome};
use crate::mutation::run_mutation;
use crate::notify::{NoticeKind, NotificationSink};
use crate::pipeline::{DependentFieldPipeline, FetchToken, PipelineInputs, PipelineState};
use crate::polling::Refreshable;
use crate::query::{QueryState, ResourceQuery};
use crate::resources::{Backend, Location, OrderReceipt, PriceQuote, PriceRequest};

/// The user's current order selections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderSelection {
    product: Option<String>,
    location: Option<String>,
    addons: BTreeSet<String>,
}

impl OrderSelection {
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn addons(&self) -> impl Iterator<Item = &str> {
        self.addons.iter().map(String::as_str)
    }

    /// Choosing a different product clears everything that depends on it
    pub fn set_product(&mut self, product: Option<String>) {
        if self.product != product {
            self.product = product;
            self.location = None;
            self.addons.clear();
        }
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    pub fn toggle_addon(&mut self, addon: &str) {
        if !self.addons.remove(addon) {
            self.addons.insert(addon.to_string());
        }
    }

    /// The backend request for these selections, if complete
    pub fn to_request(&self) -> Option<PriceRequest> {
        Some(PriceRequest {
            product: self.product.clone()?,
            location: self.location.clone()?,
            addons: self.addons.iter().cloned().collect(),
        })
    }
}

impl PipelineInputs for OrderSelection {
    fn is_complete(&self) -> bool {
        self.product.is_some() && self.location.is_some()
    }
}

/// Drives the order form: locations, price preview, submission
pub struct OrderFlow {
    backend: Backend,
    sink: Arc<dyn NotificationSink>,
    locations: ResourceQuery<Option<String>, Vec<Location>>,
    price: DependentFieldPipeline<OrderSelection, PriceQuote>,
    refresh_on_submit: Vec<Arc<dyn Refreshable>>,
}

impl std::fmt::Debug for OrderFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderFlow")
            .field("selection", &self.selection())
            .finish()
    }
}

impl OrderFlow {
    /// Must be called from within a Tokio runtime
    pub fn new(backend: Backend, sink: Arc<dyn NotificationSink>) -> Self {
        let locations = backend.locations_query(None);
        let pricing = backend.clone();
        let price = DependentFieldPipeline::new(
            "price",
            OrderSelection::default(),
            move |selection: OrderSelection| {
                let backend = pricing.clone();
                async move {
                    match selection.to_request() {
                        Some(request) => backend.price(&request).await,
                        None => Err(ErrorInfo::invalid("Incomplete selection")),
                    }
                }
            },
        );

        Self {
            backend,
            sink,
            locations,
            price,
            refresh_on_submit: Vec::new(),
        }
    }

    /// Refresh `target` after every successful submission
    pub fn refresh_on_submit(mut self, target: Arc<dyn Refreshable>) -> Self {
        self.refresh_on_submit.push(target);
        self
    }

    pub fn selection(&self) -> OrderSelection {
        self.price.inputs()
    }

    pub fn price(&self) -> PipelineState<OrderSelection, PriceQuote> {
        self.price.snapshot()
    }

    pub fn price_pipeline(&self) -> &DependentFieldPipeline<OrderSelection, PriceQuote> {
        &self.price
    }

    pub fn locations(&self) -> QueryState<Vec<Location>> {
        self.locations.snapshot()
    }

    pub fn locations_query(&self) -> &ResourceQuery<Option<String>, Vec<Location>> {
        &self.locations
    }

    pub fn select_product(&self, product: impl Into<String>) -> Option<FetchToken> {
        let product = product.into();
        let token = self.price.update(|s| s.set_product(Some(product.clone())));
        self.locations.set_params(Some(product));
        token
    }

    pub fn select_location(&self, location: impl Into<String>) -> Option<FetchToken> {
        let location = location.into();
        self.price.update(|s| s.set_location(Some(location)))
    }

    pub fn toggle_addon(&self, addon: &str) -> Option<FetchToken> {
        self.price.update(|s| s.toggle_addon(addon))
    }

    /// Submit the current selection as an order. The outcome is always
    /// reported to the notification sink.
    pub async fn submit(&self) -> RequestOutcome<OrderReceipt> {
        let Some(request) = self.selection().to_request() else {
            let err = ErrorInfo::invalid("Select a product and a location first");
            self.sink
                .notify(NoticeKind::Error, &format!("Order failed: {}", err));
            return Err(err);
        };

        tracing::info!(
            "Submitting order for '{}' at '{}'",
            request.product,
            request.location
        );
        let targets: Vec<&dyn Refreshable> =
            self.refresh_on_submit.iter().map(|t| t.as_ref()).collect();
        run_mutation(
            "Order",
            self.backend.submit_order(&request),
            self.sink.as_ref(),
            &targets,
        )
        .await
    }
}
