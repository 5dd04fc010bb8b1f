//! Step definitions for request_client.feature

use std::sync::Arc;

use cucumber::{given, then, when};
use panel_sync::client::{IDENTITY_HEADER, TIMESTAMP_HEADER};
use panel_sync::io::Method;
use panel_sync::settings::{BackendConfig, MemorySettings};
use panel_sync::ErrorKind;
use serde_json::Value;

use crate::steps::common_steps::{client_for, now_ms, HeaderRecorder, RoutingHttp};
use crate::world::PanelWorld;

// --- Given steps ---

#[given("a backend that records request headers")]
async fn recording_backend(world: &mut PanelWorld) {
    let recorder = HeaderRecorder::start().await;
    world.settings = Some(Arc::new(MemorySettings::new(BackendConfig::new(
        recorder.address.clone(),
        "",
    ))));
    world.recorder = Some(recorder);
}

#[given(expr = "the API secret is {string}")]
fn api_secret(world: &mut PanelWorld, secret: String) {
    world
        .settings
        .as_ref()
        .expect("settings not initialized")
        .set_secret_key(secret);
}

#[given("no API secret is configured")]
fn no_secret(world: &mut PanelWorld) {
    world
        .settings
        .as_ref()
        .expect("settings not initialized")
        .clear_secret_key();
}

#[given(expr = "a backend answering {string} with status {int} and body {string}")]
fn backend_answering(world: &mut PanelWorld, path: String, status: u16, body: String) {
    world
        .http
        .get_or_insert_with(Arc::<RoutingHttp>::default)
        .respond(Method::Get, &path, status, &body);
}

#[given("the backend cannot be reached")]
fn backend_unreachable(world: &mut PanelWorld) {
    world
        .http
        .get_or_insert_with(Arc::<RoutingHttp>::default)
        .set_unreachable(true);
}

// --- When steps ---

#[when(expr = "the API secret is changed to {string}")]
fn api_secret_changed(world: &mut PanelWorld, secret: String) {
    world
        .settings
        .as_ref()
        .expect("settings not initialized")
        .set_secret_key(secret);
}

#[when(expr = "the client fetches {string}")]
async fn client_fetches(world: &mut PanelWorld, path: String) {
    let client = client_for(world);
    world.call_started_ms = Some(now_ms());
    world.last_outcome = Some(client.send::<Value>(&path, Method::Get, None).await);
}

// --- Then steps ---

#[then("the call succeeds")]
fn call_succeeds(world: &mut PanelWorld) {
    let outcome = world.last_outcome.as_ref().expect("no call made");
    assert!(outcome.is_ok(), "expected success, got {:?}", outcome);
}

#[then(expr = "the request carries the identity header {string}")]
fn carries_identity(world: &mut PanelWorld, expected: String) {
    let headers = world.recorder.as_ref().expect("no recorder").last();
    let value = headers
        .get(IDENTITY_HEADER)
        .expect("identity header missing")
        .to_str()
        .unwrap();
    assert_eq!(value, expected);
}

#[then(expr = "the request timestamp is within {int} ms of the call")]
fn timestamp_within(world: &mut PanelWorld, tolerance_ms: u64) {
    let headers = world.recorder.as_ref().expect("no recorder").last();
    let stamp: u64 = headers
        .get(TIMESTAMP_HEADER)
        .expect("timestamp header missing")
        .to_str()
        .unwrap()
        .parse()
        .expect("timestamp is not an integer");
    let started = world.call_started_ms.expect("no call made");
    assert!(
        stamp.abs_diff(started) <= tolerance_ms,
        "timestamp {} is more than {} ms from {}",
        stamp,
        tolerance_ms,
        started
    );
}

#[then("the request carries no auth headers")]
fn carries_no_auth(world: &mut PanelWorld) {
    let headers = world.recorder.as_ref().expect("no recorder").last();
    assert!(headers.get(IDENTITY_HEADER).is_none());
    assert!(headers.get(TIMESTAMP_HEADER).is_none());
}

#[then(expr = "the call fails with message {string}")]
fn call_fails_with(world: &mut PanelWorld, message: String) {
    let err = world
        .last_outcome
        .as_ref()
        .expect("no call made")
        .as_ref()
        .expect_err("expected failure");
    assert_eq!(err.kind, ErrorKind::Http);
    assert_eq!(err.message, message);
}

#[then("the call fails as unreachable")]
fn call_fails_unreachable(world: &mut PanelWorld) {
    let err = world
        .last_outcome
        .as_ref()
        .expect("no call made")
        .as_ref()
        .expect_err("expected failure");
    assert!(err.is_unreachable(), "expected unreachable, got {:?}", err);
}

#[then(expr = "the error mentions {string}")]
fn error_mentions(world: &mut PanelWorld, text: String) {
    let err = world
        .last_outcome
        .as_ref()
        .expect("no call made")
        .as_ref()
        .expect_err("expected failure");
    assert!(err.message.contains(&text), "'{}' lacks '{}'", err.message, text);
}
