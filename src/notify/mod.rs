//! Notification model and delivery.
//!
//! - [`format`] - builds a [`Notification`] from one feed entry
//! - [`discord`] - delivers notifications through the Discord REST API
//!
//! The serialized field names of [`Embed`], [`ActionRow`] and [`Button`]
//! follow Discord's message object, so they can be posted as-is.

mod discord;
mod format;

pub use discord::DiscordPublisher;
pub use format::{first_img_src, format_notification, FormatError, MAX_SNIPPET_LENGTH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Custom id of the button handled by the translation interaction.
pub const TRANSLATE_BUTTON_ID: &str = "translate_rss_notification";
/// Custom id of the button handled by the summary interaction.
pub const SUMMARIZE_BUTTON_ID: &str = "summarize_rss_news";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API error: status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Insecure API base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

/// Sends notifications to channels.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Whether `channel_id` names an existing channel that accepts messages.
    async fn channel_usable(&self, channel_id: &str) -> Result<bool, PublishError>;

    async fn send(&self, channel_id: &str, notification: &Notification) -> Result<(), PublishError>;
}

/// A formatted notification for one feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub embed: Embed,
    pub components: Vec<ActionRow>,
    pub mention: Option<RoleMention>,
}

/// Mention of a role, restricted so only that role is pinged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMention {
    pub role_id: String,
}

impl RoleMention {
    /// Message content that triggers the mention.
    pub fn content(&self) -> String {
        format!("<@&{}>", self.role_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub author: EmbedAuthor,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

/// A row of interactive components (Discord component type 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn new(components: Vec<Button>) -> Self {
        Self {
            kind: 1,
            components,
        }
    }
}

/// A button (Discord component type 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub custom_id: String,
}

impl Button {
    pub fn primary(custom_id: &str, label: &str) -> Self {
        Self {
            kind: 2,
            style: 1,
            label: label.to_string(),
            custom_id: custom_id.to_string(),
        }
    }
}
