use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_ms;

/// Limits applied to every route policy evaluation.
#[derive(Debug, Deserialize, Clone)]
pub struct RhaiConfig {
    /// Maximum number of operations a policy can perform
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum function call nesting depth
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    /// Maximum size of strings in characters
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum number of array elements
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Maximum number of entries in an object map
    #[serde(default = "default_max_map_size")]
    pub max_map_size: usize,

    /// Maximum wall-clock time per evaluation
    #[serde(default = "default_execution_timeout", deserialize_with = "deserialize_duration_from_ms")]
    pub execution_timeout: Duration,
}

impl Default for RhaiConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
            max_map_size: default_max_map_size(),
            execution_timeout: default_execution_timeout(),
        }
    }
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_max_call_levels() -> usize {
    10
}

// Scan reports embed whole vulnerability descriptions, so strings are larger
// than a typical scripting default.
fn default_max_string_size() -> usize {
    1_048_576
}

fn default_max_array_size() -> usize {
    10_000
}

fn default_max_map_size() -> usize {
    10_000
}

fn default_execution_timeout() -> Duration {
    Duration::from_millis(5_000)
}
