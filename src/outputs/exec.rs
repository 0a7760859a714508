//! Runs a local shell script for every delivery.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use super::{error::OutputError, traits::Output};
use crate::models::{
    notification::{RenderedFields, RenderedFieldsExt},
    output::ExecConfig,
};

/// Environment variable carrying the rendered description.
pub const EVENT_ENV_VAR: &str = "WAYPOST_EVENT";

const SHELL: &str = "/bin/sh";

/// Longest stderr excerpt quoted in an error.
const MAX_STDERR_CHARS: usize = 512;

/// An output that runs `/bin/sh` with a script file or inline script.
pub struct ExecOutput {
    name: String,
    config: ExecConfig,
}

impl ExecOutput {
    /// Creates the output.
    pub fn new(name: &str, config: ExecConfig) -> Self {
        Self { name: name.to_string(), config }
    }

    fn command(&self, description: &str) -> Command {
        let mut command = Command::new(SHELL);
        if let Some(file) = &self.config.input_file {
            command.arg(file);
        }
        for entry in &self.config.env {
            if let Some((key, value)) = entry.split_once('=') {
                command.env(key, value);
            }
        }
        command
            .env(EVENT_ENV_VAR, description)
            .stdin(if self.config.exec_script.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Output for ExecOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "exec"
    }

    async fn init(&self) -> Result<(), OutputError> {
        if let Some(file) = &self.config.input_file {
            if !tokio::fs::try_exists(file).await? {
                return Err(OutputError::ConfigError(format!(
                    "Script file {} does not exist",
                    file.display()
                )));
            }
        }
        Ok(())
    }

    async fn send(&self, fields: &RenderedFields) -> Result<(), OutputError> {
        let mut child = self.command(fields.description()).spawn()?;

        // Dropping the child on timeout kills it.
        let run = async {
            if let Some(script) = &self.config.exec_script
                && let Some(mut stdin) = child.stdin.take()
            {
                stdin.write_all(script.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            child.wait_with_output().await
        };
        let output = tokio::time::timeout(self.config.timeout, run).await.map_err(|_| {
            OutputError::ExecFailed(format!("timed out after {:?}", self.config.timeout))
        })??;
        tracing::debug!(
            output = %self.name,
            stdout = %String::from_utf8_lossy(&output.stdout),
            "Script finished."
        );

        if !output.status.success() {
            let stderr: String =
                String::from_utf8_lossy(&output.stderr).chars().take(MAX_STDERR_CHARS).collect();
            return Err(OutputError::ExecFailed(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(())
    }
}
