use std::time::Duration;

use url::Url;

use super::*;
use crate::{
    http_client::ClientSettings,
    models::output::{DiscordConfig, GenericWebhookConfig, SlackConfig, TeamsConfig, TelegramConfig},
    outputs::error::OutputError,
};

/// Base URL of the Telegram Bot API.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// The generic pieces every webhook-based output is assembled from.
pub struct WebhookComponents {
    /// Endpoint, method, secret and headers.
    pub config: WebhookConfig,
    /// Settings of the pooled HTTP client to use.
    pub client_settings: ClientSettings,
    /// The payload builder responsible for the channel-specific JSON body.
    pub builder: Box<dyn WebhookPayloadBuilder>,
}

impl WebhookComponents {
    fn post(url: Url, client_settings: ClientSettings, builder: Box<dyn WebhookPayloadBuilder>) -> Self {
        WebhookComponents {
            config: WebhookConfig { url, method: None, secret: None, headers: None },
            client_settings,
            builder,
        }
    }
}

impl From<&GenericWebhookConfig> for WebhookComponents {
    fn from(c: &GenericWebhookConfig) -> Self {
        WebhookComponents {
            config: WebhookConfig {
                url: c.url.clone(),
                method: c.method.clone(),
                secret: c.secret.clone(),
                headers: c.headers.clone(),
            },
            client_settings: ClientSettings {
                retry: c.retry_policy.clone(),
                timeout: Some(c.timeout),
                accept_invalid_certs: false,
            },
            builder: Box::new(GenericWebhookPayloadBuilder),
        }
    }
}

impl From<&SlackConfig> for WebhookComponents {
    fn from(c: &SlackConfig) -> Self {
        Self::post(
            c.slack_url.clone(),
            ClientSettings::with_retry(&c.retry_policy),
            Box::new(SlackPayloadBuilder),
        )
    }
}

impl From<&DiscordConfig> for WebhookComponents {
    fn from(c: &DiscordConfig) -> Self {
        Self::post(
            c.discord_url.clone(),
            ClientSettings::with_retry(&c.retry_policy),
            Box::new(DiscordPayloadBuilder),
        )
    }
}

impl From<&TeamsConfig> for WebhookComponents {
    fn from(c: &TeamsConfig) -> Self {
        Self::post(
            c.webhook_url.clone(),
            ClientSettings {
                retry: c.retry_policy.clone(),
                timeout: Some(Duration::from_secs(30)),
                accept_invalid_certs: false,
            },
            Box::new(TeamsPayloadBuilder),
        )
    }
}

impl TryFrom<&TelegramConfig> for WebhookComponents {
    type Error = OutputError;

    fn try_from(c: &TelegramConfig) -> Result<Self, Self::Error> {
        let url = Url::parse(&format!("{TELEGRAM_API_BASE}/bot{}/sendMessage", c.token))
            .map_err(|e| OutputError::ConfigError(format!("Invalid Telegram token: {e}")))?;
        Ok(Self::post(
            url,
            ClientSettings::with_retry(&c.retry_policy),
            Box::new(TelegramPayloadBuilder {
                chat_id: c.chat_id.clone(),
                disable_web_preview: c.disable_web_preview.unwrap_or(false),
            }),
        ))
    }
}
