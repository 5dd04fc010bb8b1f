//! BDD step definitions for the panel-sync core

pub mod client_steps;
pub mod order_steps;
pub mod query_steps;
