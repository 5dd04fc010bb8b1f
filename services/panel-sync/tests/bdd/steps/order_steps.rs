//! Step definitions for order_pipeline.feature

use std::sync::Arc;

use cucumber::{given, then, when};
use panel_sync::io::Method;
use panel_sync::notify::{NoticeKind, RecordingSink};
use panel_sync::order::OrderFlow;
use panel_sync::resources::{Backend, PriceQuote};
use serde_json::json;

use crate::steps::common_steps::{client_for, CountingTarget, RoutingHttp};
use crate::world::PanelWorld;

fn http(world: &mut PanelWorld) -> Arc<RoutingHttp> {
    world
        .http
        .get_or_insert_with(Arc::<RoutingHttp>::default)
        .clone()
}

fn flow(world: &mut PanelWorld) -> &OrderFlow {
    if world.flow.is_none() {
        let backend = Backend::new(client_for(world));
        let sink = world.sink.get_or_insert_with(Arc::default).clone();
        let queue = world.queue_refreshes.get_or_insert_with(Arc::default).clone();
        world.flow = Some(OrderFlow::new(backend, sink).refresh_on_submit(queue));
    }
    world.flow.as_ref().expect("order flow just created")
}

fn price(world: &PanelWorld) -> Option<PriceQuote> {
    world.flow.as_ref().expect("no order flow").price().value
}

fn split(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).collect()
}

// --- Given steps ---

#[given(expr = "the backend offers locations {string} for product {string}")]
fn offers_locations(world: &mut PanelWorld, locations: String, product: String) {
    let body: Vec<_> = split(&locations)
        .into_iter()
        .map(|id| json!({ "id": id, "name": id }))
        .collect();
    http(world).respond(
        Method::Get,
        &format!("/api/products/{}/locations", product),
        200,
        &json!(body).to_string(),
    );
}

#[given(expr = "the backend prices location {string} at {float} after {int} ms")]
fn prices_location(world: &mut PanelWorld, location: String, amount: f64, delay_ms: u64) {
    let needle = format!("\"location\":\"{}\"", location);
    http(world).respond_when(
        Method::Post,
        "/api/price",
        Some(&needle),
        delay_ms,
        200,
        &json!({ "amount": amount, "currency": "EUR" }).to_string(),
    );
}

#[given(expr = "pricing fails with {string}")]
fn pricing_fails(world: &mut PanelWorld, message: String) {
    http(world).respond(
        Method::Post,
        "/api/price",
        503,
        &json!({ "message": message }).to_string(),
    );
}

#[given(expr = "the backend accepts orders as {string}")]
fn accepts_orders(world: &mut PanelWorld, id: String) {
    http(world).respond(
        Method::Post,
        "/api/queue",
        201,
        &json!({ "id": id }).to_string(),
    );
}

#[given(expr = "the backend rejects orders with {string}")]
fn rejects_orders(world: &mut PanelWorld, message: String) {
    http(world).respond(
        Method::Post,
        "/api/queue",
        402,
        &json!({ "message": message }).to_string(),
    );
}

// --- When steps ---

#[when(expr = "the user selects product {string}")]
fn select_product(world: &mut PanelWorld, product: String) {
    flow(world).select_product(product);
}

#[when(expr = "the user selects location {string}")]
fn select_location(world: &mut PanelWorld, location: String) {
    flow(world).select_location(location);
}

#[when(expr = "the user toggles add-on {string}")]
fn toggle_addon(world: &mut PanelWorld, addon: String) {
    flow(world).toggle_addon(&addon);
}

#[when("the user submits the order")]
async fn submit_order(world: &mut PanelWorld) {
    let outcome = flow(world).submit().await;
    world.order_outcome = Some(outcome);
}

// --- Then steps ---

#[then(expr = "the available locations are {string}")]
fn available_locations(world: &mut PanelWorld, expected: String) {
    let state = flow(world).locations();
    let ids: Vec<String> = state
        .data
        .expect("locations not loaded")
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert_eq!(ids, split(&expected));
}

#[then("no location is selected")]
fn no_location(world: &mut PanelWorld) {
    assert_eq!(flow(world).selection().location(), None);
}

#[then("no price is shown")]
fn no_price(world: &mut PanelWorld) {
    assert_eq!(price(world), None);
}

#[then("the price is being fetched")]
fn price_fetching(world: &mut PanelWorld) {
    assert!(flow(world).price().is_fetching);
}

#[then("the price is not being fetched")]
fn price_not_fetching(world: &mut PanelWorld) {
    assert!(!flow(world).price().is_fetching);
}

#[then(expr = "the price is {float}")]
fn price_is(world: &mut PanelWorld, amount: f64) {
    let quote = price(world).expect("no price shown");
    assert!(
        (quote.amount - amount).abs() < f64::EPSILON,
        "expected {}, got {}",
        amount,
        quote.amount
    );
}

#[then(expr = "the price error is {string}")]
fn price_error(world: &mut PanelWorld, message: String) {
    let error = flow(world).price().last_error.expect("no price error");
    assert_eq!(error.message, message);
}

#[then(expr = "the order was accepted as {string}")]
fn order_accepted(world: &mut PanelWorld, id: String) {
    let outcome = world.order_outcome.as_ref().expect("no order submitted");
    let receipt = outcome.as_ref().expect("order failed");
    assert_eq!(receipt.id, id);
}

#[then(expr = "the order failed with {string}")]
fn order_failed(world: &mut PanelWorld, message: String) {
    let outcome = world.order_outcome.as_ref().expect("no order submitted");
    let err = outcome.as_ref().expect_err("order succeeded");
    assert_eq!(err.message, message);
}

#[then(expr = "a success notification {string} was sent")]
fn success_notification(world: &mut PanelWorld, text: String) {
    let notices = world.sink.as_ref().expect("no sink").notices();
    assert!(
        notices
            .iter()
            .any(|n| n.kind == NoticeKind::Success && n.text == text),
        "missing success notice '{}' in {:?}",
        text,
        notices
    );
}

#[then(expr = "an error notification {string} was sent")]
fn error_notification(world: &mut PanelWorld, text: String) {
    let notices = world.sink.as_ref().expect("no sink").notices();
    assert!(
        notices
            .iter()
            .any(|n| n.kind == NoticeKind::Error && n.text == text),
        "missing error notice '{}' in {:?}",
        text,
        notices
    );
}

#[then("no notification was sent")]
fn no_notification(world: &mut PanelWorld) {
    let sink: &RecordingSink = world.sink.as_ref().expect("no sink");
    assert!(sink.notices().is_empty(), "unexpected {:?}", sink.notices());
}

#[then(expr = "the queue was refreshed {int} times")]
fn queue_refreshed(world: &mut PanelWorld, expected: u32) {
    let queue: &CountingTarget = world.queue_refreshes.as_ref().expect("no queue target");
    assert_eq!(queue.calls(), expected);
}

#[then("no order was sent to the backend")]
fn no_order_sent(world: &mut PanelWorld) {
    let sent = http(world)
        .requests()
        .into_iter()
        .any(|r| r.method == Method::Post && r.url.ends_with("/api/queue"));
    assert!(!sent, "an order request reached the backend");
}
