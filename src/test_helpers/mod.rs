//! A set of helpers for testing

mod output;
mod output_config;
mod renderer;
mod route;
mod store;

pub use output::{FailingOutput, RecordingOutput};
pub use output_config::OutputBuilder;
pub use renderer::FieldRenderer;
pub use route::{RouteBuilder, route_set};
pub use store::{InMemoryDeliveryStore, create_test_store};
