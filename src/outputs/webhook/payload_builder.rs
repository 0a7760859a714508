//! Channel-specific JSON payloads built from rendered fields.

use serde_json::{Value, json};

use crate::models::notification::{RenderedFields, RenderedFieldsExt};

/// Discord rejects `content` longer than this.
const DISCORD_MAX_CHARS: usize = 2000;
/// Telegram rejects messages longer than this.
const TELEGRAM_MAX_CHARS: usize = 4096;
/// Teams cards larger than this are replaced by a short message.
pub const TEAMS_MAX_CHARS: usize = 18000;

/// A trait for building channel-specific webhook payloads.
pub trait WebhookPayloadBuilder: Send + Sync {
    /// Builds the JSON body for one delivery.
    fn build_payload(&self, fields: &RenderedFields) -> Value;
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars.saturating_sub(1)) {
        Some((idx, _)) if text[idx..].chars().count() > 1 => format!("{}…", &text[..idx]),
        _ => text.to_string(),
    }
}

/// Slack `blocks` with a header, the description and an optional link.
pub struct SlackPayloadBuilder;

impl WebhookPayloadBuilder for SlackPayloadBuilder {
    fn build_payload(&self, fields: &RenderedFields) -> Value {
        let mut blocks = vec![
            json!({ "type": "header", "text": { "type": "plain_text", "text": fields.title() } }),
            json!({ "type": "section", "text": { "type": "mrkdwn", "text": fields.description() } }),
        ];
        if let Some(url) = fields.url() {
            blocks.push(json!({
                "type": "context",
                "elements": [{ "type": "mrkdwn", "text": format!("<{url}|See more>") }]
            }));
        }
        json!({ "text": fields.title(), "blocks": blocks })
    }
}

/// Discord `content` in markdown.
pub struct DiscordPayloadBuilder;

impl WebhookPayloadBuilder for DiscordPayloadBuilder {
    fn build_payload(&self, fields: &RenderedFields) -> Value {
        let mut message = format!("**{}**\n\n{}", fields.title(), fields.description());
        if let Some(url) = fields.url() {
            message.push_str(&format!("\n\n{url}"));
        }
        json!({ "content": truncate(&message, DISCORD_MAX_CHARS) })
    }
}

/// Telegram `sendMessage` with MarkdownV2.
pub struct TelegramPayloadBuilder {
    /// The chat ID to send the message to.
    pub chat_id: String,
    /// Whether to disable web page previews in the message.
    pub disable_web_preview: bool,
}

const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

impl TelegramPayloadBuilder {
    /// Escapes text for MarkdownV2, leaving ``` blocks intact apart from the
    /// characters Telegram requires escaped inside them.
    fn escape_markdown_v2(text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 2);
        for (i, part) in text.split("```").enumerate() {
            if i > 0 {
                out.push_str("```");
            }
            let in_code = i % 2 == 1;
            for c in part.chars() {
                let escape = if in_code { c == '`' || c == '\\' } else { MARKDOWN_V2_SPECIAL.contains(&c) };
                if escape {
                    out.push('\\');
                }
                out.push(c);
            }
        }
        out
    }
}

impl WebhookPayloadBuilder for TelegramPayloadBuilder {
    fn build_payload(&self, fields: &RenderedFields) -> Value {
        let mut message = format!(
            "*{}*\n\n{}",
            Self::escape_markdown_v2(fields.title()),
            Self::escape_markdown_v2(&truncate(fields.description(), TELEGRAM_MAX_CHARS / 2))
        );
        if let Some(url) = fields.url() {
            message.push_str(&format!("\n\n{}", Self::escape_markdown_v2(url)));
        }
        json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": self.disable_web_preview
        })
    }
}

/// Microsoft Teams incoming webhook `text`.
pub struct TeamsPayloadBuilder;

impl WebhookPayloadBuilder for TeamsPayloadBuilder {
    fn build_payload(&self, fields: &RenderedFields) -> Value {
        let full = format!("**{}**\n\n{}", fields.title(), fields.description());
        if full.chars().count() <= TEAMS_MAX_CHARS {
            return json!({ "text": full });
        }

        tracing::debug!(title = fields.title(), "Teams message too long, sending short message.");
        let short = match fields.url() {
            Some(url) => format!(
                "**{}**\n\nThe message is too long to display here. See the details at {url}",
                fields.title()
            ),
            None => format!("**{}**\n\nThe message is too long to display here.", fields.title()),
        };
        json!({ "text": short })
    }
}

/// Generic webhooks receive the description itself when it is JSON, or
/// `{title, description, url}` otherwise.
pub struct GenericWebhookPayloadBuilder;

impl WebhookPayloadBuilder for GenericWebhookPayloadBuilder {
    fn build_payload(&self, fields: &RenderedFields) -> Value {
        if let Ok(value @ (Value::Object(_) | Value::Array(_))) =
            serde_json::from_str::<Value>(fields.description())
        {
            return value;
        }
        json!({
            "title": fields.title(),
            "description": fields.description(),
            "url": fields.url(),
        })
    }
}
