//! Webhook-based outputs: generic webhooks and chat services.

mod client;
mod components;
mod output;
mod payload_builder;

pub use client::{WebhookClient, WebhookConfig};
pub use components::WebhookComponents;
pub use output::WebhookOutput;
pub use payload_builder::{
    DiscordPayloadBuilder, GenericWebhookPayloadBuilder, SlackPayloadBuilder, TEAMS_MAX_CHARS,
    TeamsPayloadBuilder, TelegramPayloadBuilder, WebhookPayloadBuilder,
};
