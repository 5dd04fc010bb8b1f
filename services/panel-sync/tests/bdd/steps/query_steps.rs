//! Step definitions for resource_query.feature

use std::sync::Arc;

use cucumber::{given, then, when};
use panel_sync::query::ResourceQuery;

use crate::steps::common_steps::ScriptedResource;
use crate::world::PanelWorld;

fn resource(world: &mut PanelWorld) -> Arc<ScriptedResource> {
    world
        .resource
        .get_or_insert_with(Arc::<ScriptedResource>::default)
        .clone()
}

fn query(world: &PanelWorld) -> &ResourceQuery<String, String> {
    world.query.as_ref().expect("no query activated")
}

// --- Given steps ---

#[given(expr = "the resource answers key {string} after {int} ms")]
fn answers_after(world: &mut PanelWorld, key: String, delay_ms: u64) {
    resource(world).set_delay(&key, delay_ms);
}

// --- When steps ---

#[when(expr = "a query for key {string} is activated")]
fn activate_query(world: &mut PanelWorld, key: String) {
    let resource = resource(world);
    world.query = Some(ResourceQuery::new("scripted", key, move |key: String| {
        resource.fetch(key)
    }));
}

#[when(expr = "the query key changes to {string}")]
fn change_key(world: &mut PanelWorld, key: String) {
    assert!(query(world).set_params(key), "key was unchanged");
}

#[when(expr = "the query key is set to {string} again")]
fn same_key(world: &mut PanelWorld, key: String) {
    assert!(!query(world).set_params(key), "key unexpectedly changed");
}

#[when(expr = "the resource starts failing with {string}")]
fn starts_failing(world: &mut PanelWorld, message: String) {
    resource(world).fail_with(Some(message));
}

#[when("the resource recovers")]
fn recovers(world: &mut PanelWorld) {
    resource(world).fail_with(None);
}

#[when("the query is refreshed manually")]
async fn refresh_manually(world: &mut PanelWorld) {
    let outcome = query(world).refetch().await;
    world.manual_refresh = Some(outcome);
}

// --- Then steps ---

#[then("the query is loading without data")]
fn loading_without_data(world: &mut PanelWorld) {
    let state = query(world).snapshot();
    assert!(state.is_loading);
    assert!(state.data.is_none());
    assert!(state.error.is_none());
}

#[then(expr = "the query shows {string}")]
fn query_shows(world: &mut PanelWorld, expected: String) {
    assert_eq!(query(world).snapshot().data, Some(expected));
}

#[then("the query is not loading")]
fn not_loading(world: &mut PanelWorld) {
    assert!(!query(world).snapshot().is_loading);
}

#[then(expr = "the query error is {string}")]
fn query_error(world: &mut PanelWorld, message: String) {
    let state = query(world).snapshot();
    let error = state.error.expect("query has no error");
    assert_eq!(error.message, message);
}

#[then("the query has no error")]
fn query_no_error(world: &mut PanelWorld) {
    assert!(query(world).snapshot().error.is_none());
}

#[then(expr = "the manual refresh failed with {string}")]
fn manual_refresh_failed(world: &mut PanelWorld, message: String) {
    let outcome = world.manual_refresh.as_ref().expect("no manual refresh");
    let err = outcome.as_ref().expect_err("manual refresh succeeded");
    assert_eq!(err.message, message);
}

#[then(expr = "the resource was fetched {int} times")]
fn fetched_times(world: &mut PanelWorld, expected: u32) {
    assert_eq!(resource(world).calls(), expected);
}
