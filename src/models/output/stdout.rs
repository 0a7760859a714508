use serde::{Deserialize, Serialize};

/// Configuration for printing deliveries to standard output.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct StdoutConfig {
    /// Print the fields as a single JSON line instead of a text block.
    #[serde(default)]
    pub json: bool,
}
