//! Route configuration and the aggregation policy derived from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{deserialize_duration_from_seconds, serialize_duration_to_seconds},
    loader::{Loadable, LoaderError},
};

/// When to flush a route's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Every accepted event is dispatched on its own.
    None,
    /// Flush once `N` items are buffered.
    ByCount(usize),
    /// Flush whatever is buffered every period.
    ByTime(Duration),
    /// Flush on whichever threshold is reached first.
    ByCountOrTime(usize, Duration),
}

impl AggregationPolicy {
    /// Count threshold, if any.
    pub fn count_threshold(&self) -> Option<usize> {
        match self {
            AggregationPolicy::ByCount(n) | AggregationPolicy::ByCountOrTime(n, _) => Some(*n),
            _ => None,
        }
    }

    /// Timer period, if any.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            AggregationPolicy::ByTime(t) | AggregationPolicy::ByCountOrTime(_, t) => Some(*t),
            _ => None,
        }
    }

    /// True when events bypass buffering.
    pub fn is_none(&self) -> bool {
        matches!(self, AggregationPolicy::None)
    }
}

/// A single route from `routes.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// The unique name of the route.
    pub name: String,

    /// Rhai policy deciding whether an event applies. Empty accepts everything.
    #[serde(default)]
    pub policy: String,

    /// Flush after this many events. `0` disables the count trigger.
    #[serde(default)]
    pub aggregate_count: usize,

    /// Flush pending events this often. `0` disables the timer.
    #[serde(
        default,
        rename = "aggregate_timeout_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub aggregate_timeout: Duration,

    /// Names of the outputs, in delivery order.
    pub outputs: Vec<String>,

    /// Template used to render events; the built-in default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Event paths whose values identify a duplicate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_message_props: Vec<String>,

    /// How long a delivered fingerprint suppresses duplicates. `0` keeps it forever.
    #[serde(
        default,
        rename = "unique_message_timeout_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub unique_message_timeout: Duration,
}

impl RouteConfig {
    /// Creates a route with no policy, no aggregation and the default template.
    pub fn new(name: &str, outputs: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            policy: String::new(),
            aggregate_count: 0,
            aggregate_timeout: Duration::ZERO,
            outputs,
            template: None,
            unique_message_props: Vec::new(),
            unique_message_timeout: Duration::ZERO,
        }
    }

    /// Derives the aggregation policy from the configured thresholds.
    pub fn aggregation_policy(&self) -> AggregationPolicy {
        match (self.aggregate_count, self.aggregate_timeout.is_zero()) {
            (0, true) => AggregationPolicy::None,
            (n, true) => AggregationPolicy::ByCount(n),
            (0, false) => AggregationPolicy::ByTime(self.aggregate_timeout),
            (n, false) => AggregationPolicy::ByCountOrTime(n, self.aggregate_timeout),
        }
    }

    /// Validates the route configuration.
    pub fn check(&self) -> Result<(), RouteConfigError> {
        if self.name.trim().is_empty() {
            return Err(RouteConfigError::EmptyName);
        }
        if self.outputs.is_empty() {
            return Err(RouteConfigError::NoOutputs(self.name.clone()));
        }
        if self.unique_message_props.iter().any(|p| p.trim().is_empty()) {
            return Err(RouteConfigError::EmptyUniqueProp(self.name.clone()));
        }
        Ok(())
    }
}

/// Validation errors for routes.
#[derive(Debug, Clone, Error)]
pub enum RouteConfigError {
    /// The route has no name.
    #[error("Route name cannot be empty.")]
    EmptyName,

    /// The route references no outputs.
    #[error("Route '{0}' must reference at least one output.")]
    NoOutputs(String),

    /// A dedup property is blank.
    #[error("Route '{0}' has an empty entry in unique_message_props.")]
    EmptyUniqueProp(String),
}

/// Errors that can occur while loading routes.
#[derive(Debug, Error)]
pub enum RouteLoadError {
    /// An error occurred during the loading process.
    #[error("Failed to load route configuration: {0}")]
    Loader(#[from] LoaderError),

    /// An error occurred during validation.
    #[error("Invalid route configuration: {0}")]
    Validation(#[from] RouteConfigError),
}

impl Loadable for RouteConfig {
    type Error = RouteLoadError;

    const KEY: &'static str = "routes";

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&mut self) -> Result<(), Self::Error> {
        self.check().map_err(RouteLoadError::Validation)
    }
}
