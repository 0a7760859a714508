//! Data structures for output configurations.

mod exec;
mod splunk;
mod stdout;
mod webhook;

pub use exec::ExecConfig;
use serde::{Deserialize, Serialize};
pub use splunk::{DEFAULT_SPLUNK_EVENT_LIMIT, SplunkConfig};
pub use stdout::StdoutConfig;
use thiserror::Error;
pub use webhook::{DiscordConfig, GenericWebhookConfig, SlackConfig, TeamsConfig, TelegramConfig};

use crate::loader::{Loadable, LoaderError};

/// The type of output configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputTypeConfig {
    /// A generic webhook.
    Webhook(GenericWebhookConfig),
    /// A Slack notification.
    Slack(SlackConfig),
    /// A Discord notification.
    Discord(DiscordConfig),
    /// A Telegram notification.
    Telegram(TelegramConfig),
    /// A Microsoft Teams notification.
    Teams(TeamsConfig),
    /// A Splunk HEC event.
    Splunk(SplunkConfig),
    /// A local shell script.
    Exec(ExecConfig),
    /// A stdout notification.
    Stdout(StdoutConfig),
}

impl OutputTypeConfig {
    /// Short name of the output type, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutputTypeConfig::Webhook(_) => "webhook",
            OutputTypeConfig::Slack(_) => "slack",
            OutputTypeConfig::Discord(_) => "discord",
            OutputTypeConfig::Telegram(_) => "telegram",
            OutputTypeConfig::Teams(_) => "teams",
            OutputTypeConfig::Splunk(_) => "splunk",
            OutputTypeConfig::Exec(_) => "exec",
            OutputTypeConfig::Stdout(_) => "stdout",
        }
    }

    /// Validates the output configuration.
    pub fn validate(&self) -> Result<(), OutputTypeConfigError> {
        match self {
            OutputTypeConfig::Webhook(config) => {
                if let Some(method) = &config.method
                    && reqwest::Method::from_bytes(method.to_uppercase().as_bytes()).is_err()
                {
                    return Err(OutputTypeConfigError::InvalidMethod(method.clone()));
                }
                if config.timeout.is_zero() {
                    return Err(OutputTypeConfigError::ZeroTimeout);
                }
                Ok(())
            }
            OutputTypeConfig::Slack(config) => {
                if config.slack_url.domain() != Some("hooks.slack.com") {
                    return Err(OutputTypeConfigError::InvalidSlackUrl);
                }
                Ok(())
            }
            OutputTypeConfig::Discord(config) => {
                if config.discord_url.domain() != Some("discord.com") {
                    return Err(OutputTypeConfigError::InvalidDiscordUrl);
                }
                Ok(())
            }
            OutputTypeConfig::Telegram(config) => {
                if config.token.is_empty() {
                    return Err(OutputTypeConfigError::EmptyTelegramToken);
                }
                if config.chat_id.is_empty() {
                    return Err(OutputTypeConfigError::EmptyTelegramChatId);
                }
                Ok(())
            }
            // Teams URLs vary by tenant and connector type.
            OutputTypeConfig::Teams(_) => Ok(()),
            OutputTypeConfig::Splunk(config) => {
                if config.token.is_empty() {
                    return Err(OutputTypeConfigError::EmptySplunkToken);
                }
                if config.event_limit == 0 {
                    return Err(OutputTypeConfigError::ZeroEventLimit);
                }
                Ok(())
            }
            OutputTypeConfig::Exec(config) => {
                match (&config.input_file, &config.exec_script) {
                    (Some(_), None) => {}
                    (None, Some(script)) if !script.trim().is_empty() => {}
                    _ => return Err(OutputTypeConfigError::ExecScriptSource),
                }
                if let Some(entry) = config.env.iter().find(|e| !e.contains('=')) {
                    return Err(OutputTypeConfigError::InvalidEnvEntry(entry.clone()));
                }
                if config.timeout.is_zero() {
                    return Err(OutputTypeConfigError::ZeroTimeout);
                }
                Ok(())
            }
            OutputTypeConfig::Stdout(_) => Ok(()),
        }
    }
}

/// Error types for output configuration validation.
#[derive(Debug, Clone, Error)]
pub enum OutputTypeConfigError {
    /// The webhook method is not a valid HTTP method.
    #[error("Invalid HTTP method '{0}'.")]
    InvalidMethod(String),

    /// Error for empty Telegram token.
    #[error("Telegram token cannot be empty.")]
    EmptyTelegramToken,

    /// Error for empty Telegram chat ID.
    #[error("Telegram chat ID cannot be empty.")]
    EmptyTelegramChatId,

    /// Error for invalid Discord webhook URL.
    #[error("Invalid Discord URL: must be a valid Discord webhook URL.")]
    InvalidDiscordUrl,

    /// Error for invalid Slack webhook URL.
    #[error("Invalid Slack URL: must be a valid Slack webhook URL.")]
    InvalidSlackUrl,

    /// Error for empty Splunk HEC token.
    #[error("Splunk token cannot be empty.")]
    EmptySplunkToken,

    /// Error for a zero Splunk event limit.
    #[error("Splunk event_limit must be greater than zero.")]
    ZeroEventLimit,

    /// Exec outputs need exactly one script source.
    #[error("Exec output needs exactly one of input_file or exec_script.")]
    ExecScriptSource,

    /// Webhook and exec timeouts must be positive.
    #[error("timeout must be greater than zero.")]
    ZeroTimeout,

    /// An exec env entry is not `KEY=VALUE`.
    #[error("Invalid env entry '{0}': expected KEY=VALUE.")]
    InvalidEnvEntry(String),
}

fn default_enable() -> bool {
    true
}

/// Represents a single output configuration from the YAML file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OutputConfig {
    /// The unique name of the output.
    pub name: String,

    /// Disabled outputs are skipped when building the route table.
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// The specific configuration for the output type.
    #[serde(flatten)]
    pub config: OutputTypeConfig,
}

/// Errors that can occur during output loading.
#[derive(Debug, Error)]
pub enum OutputConfigError {
    /// An error occurred during the loading process.
    #[error("Failed to load output configuration: {0}")]
    Loader(#[from] LoaderError),

    /// An error occurred during validation.
    #[error("Invalid output '{name}': {source}")]
    Validation {
        /// The output that failed validation.
        name: String,
        /// The validation failure.
        source: OutputTypeConfigError,
    },
}

impl Loadable for OutputConfig {
    type Error = OutputConfigError;

    const KEY: &'static str = "outputs";

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&mut self) -> Result<(), Self::Error> {
        self.config
            .validate()
            .map_err(|source| OutputConfigError::Validation { name: self.name.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use url::Url;

    use super::*;
    use crate::{config::HttpRetryConfig, loader::load_config};

    #[test]
    fn test_validate_slack_not_a_slack_url() {
        let config = OutputTypeConfig::Slack(SlackConfig {
            slack_url: Url::parse("https://example.com/not-slack").unwrap(),
            retry_policy: HttpRetryConfig::default(),
        });
        assert!(matches!(config.validate().unwrap_err(), OutputTypeConfigError::InvalidSlackUrl));
    }

    #[test]
    fn test_validate_discord_invalid_url() {
        let config = OutputTypeConfig::Discord(DiscordConfig {
            discord_url: Url::parse("https://example.com/not-discord").unwrap(),
            retry_policy: HttpRetryConfig::default(),
        });
        assert!(matches!(config.validate().unwrap_err(), OutputTypeConfigError::InvalidDiscordUrl));
    }

    #[test]
    fn test_validate_telegram_empty_chat_id() {
        let config = OutputTypeConfig::Telegram(TelegramConfig {
            token: "test_token".to_string(),
            chat_id: "".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            config.validate().unwrap_err(),
            OutputTypeConfigError::EmptyTelegramChatId
        ));
    }

    #[test]
    fn test_validate_webhook_method() {
        let mut webhook = GenericWebhookConfig {
            url: Url::parse("http://localhost/hook").unwrap(),
            method: Some("put".into()),
            secret: None,
            headers: None,
            timeout: Duration::from_secs(120),
            retry_policy: HttpRetryConfig::default(),
        };
        assert!(OutputTypeConfig::Webhook(webhook.clone()).validate().is_ok());

        webhook.method = Some("NOT A METHOD".into());
        assert!(matches!(
            OutputTypeConfig::Webhook(webhook).validate().unwrap_err(),
            OutputTypeConfigError::InvalidMethod(_)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let webhook = OutputTypeConfig::Webhook(GenericWebhookConfig {
            url: Url::parse("http://localhost/hook").unwrap(),
            method: None,
            secret: None,
            headers: None,
            timeout: Duration::ZERO,
            retry_policy: HttpRetryConfig::default(),
        });
        assert!(matches!(webhook.validate().unwrap_err(), OutputTypeConfigError::ZeroTimeout));

        let exec = OutputTypeConfig::Exec(ExecConfig {
            exec_script: Some("echo hi".into()),
            timeout: Duration::ZERO,
            ..Default::default()
        });
        assert!(matches!(exec.validate().unwrap_err(), OutputTypeConfigError::ZeroTimeout));
    }

    #[test]
    fn test_exec_timeout_defaults_and_parses_seconds() {
        let exec: OutputTypeConfig =
            serde_json::from_str(r#"{"exec": {"exec_script": "true"}}"#).unwrap();
        let OutputTypeConfig::Exec(config) = exec else { panic!("expected an exec output") };
        assert_eq!(config.timeout, Duration::from_secs(60));

        let exec: OutputTypeConfig =
            serde_json::from_str(r#"{"exec": {"exec_script": "true", "timeout": 5}}"#).unwrap();
        let OutputTypeConfig::Exec(config) = exec else { panic!("expected an exec output") };
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_exec_needs_one_script_source() {
        let both = OutputTypeConfig::Exec(ExecConfig {
            input_file: Some("/opt/hook.sh".into()),
            exec_script: Some("echo hi".into()),
            ..Default::default()
        });
        assert!(matches!(both.validate().unwrap_err(), OutputTypeConfigError::ExecScriptSource));

        let neither = OutputTypeConfig::Exec(ExecConfig::default());
        assert!(matches!(neither.validate().unwrap_err(), OutputTypeConfigError::ExecScriptSource));

        let bad_env = OutputTypeConfig::Exec(ExecConfig {
            exec_script: Some("echo hi".into()),
            env: vec!["NOEQUALS".into()],
            ..Default::default()
        });
        assert!(matches!(
            bad_env.validate().unwrap_err(),
            OutputTypeConfigError::InvalidEnvEntry(e) if e == "NOEQUALS"
        ));
    }

    #[test]
    fn test_load_outputs_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
outputs:
  - name: slack-main
    slack:
      slack_url: "https://hooks.slack.com/services/T000/B000/XXXX"
  - name: siem
    enable: false
    splunk:
      url: "https://splunk.internal:8088"
      token: "hec-token"
  - name: console
    stdout: {{}}
"#
        )
        .unwrap();

        let outputs: Vec<OutputConfig> = load_config(path).unwrap();
        assert_eq!(outputs.len(), 3);
        assert!(outputs[0].enable);
        assert_eq!(outputs[0].config.kind(), "slack");

        assert!(!outputs[1].enable);
        let OutputTypeConfig::Splunk(splunk) = &outputs[1].config else {
            panic!("expected a splunk output");
        };
        assert_eq!(splunk.event_limit, DEFAULT_SPLUNK_EVENT_LIMIT);
        assert_eq!(splunk.truncation_order, vec!["resources", "malwares", "sensitive_data"]);

        assert!(matches!(outputs[2].config, OutputTypeConfig::Stdout(StdoutConfig { json: false })));
    }

    #[test]
    fn test_load_reports_invalid_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.yaml");
        std::fs::write(
            &path,
            "outputs:\n  - name: bad-splunk\n    splunk:\n      url: \"https://s:8088\"\n      token: \"\"\n",
        )
        .unwrap();

        let err = load_config::<OutputConfig>(path).unwrap_err();
        assert!(matches!(
            err,
            OutputConfigError::Validation { ref name, source: OutputTypeConfigError::EmptySplunkToken }
                if name == "bad-splunk"
        ));
    }
}
