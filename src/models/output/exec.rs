use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::config::{deserialize_duration_from_seconds, serialize_duration_to_seconds};

fn default_exec_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Configuration for running a local shell script per delivery.
///
/// Exactly one of `input_file` and `exec_script` must be set. The rendered
/// description is exported to the script as `WAYPOST_EVENT`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExecConfig {
    /// Script file passed to `/bin/sh`.
    #[serde(default)]
    pub input_file: Option<PathBuf>,
    /// Inline script fed to `/bin/sh` on stdin.
    #[serde(default)]
    pub exec_script: Option<String>,
    /// Extra `KEY=VALUE` environment entries.
    #[serde(default)]
    pub env: Vec<String>,
    /// How long a script may run before it is killed.
    #[serde(
        default = "default_exec_timeout",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            input_file: None,
            exec_script: None,
            env: Vec::new(),
            timeout: default_exec_timeout(),
        }
    }
}
