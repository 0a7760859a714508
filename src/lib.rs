#![warn(missing_docs)]
//! waypost routes security events to notification outputs.
//!
//! Every event is offered to each configured route. A route's policy decides
//! whether the event applies, its aggregation settings decide whether it is
//! delivered at once or batched by count and time, and its outputs receive
//! the rendered result.

pub mod config;
pub mod engine;
pub mod http_client;
pub mod http_server;
pub mod loader;
pub mod models;
pub mod outputs;
pub mod persistence;
pub mod supervisor;
pub mod template;
pub mod test_helpers;
