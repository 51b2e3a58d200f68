use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{ActionRow, Embed, Notification, PublishError, Publisher};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ERROR_BODY: usize = 512;

/// Channel types that accept bot messages: guild text, announcement and the
/// three thread kinds.
const MESSAGEABLE_CHANNEL_TYPES: [u8; 5] = [0, 5, 10, 11, 12];

/// Publishes notifications through the Discord REST API with a bot token.
pub struct DiscordPublisher {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    /// Channel ids already confirmed usable. Negative answers are not kept,
    /// so a channel fixed on the Discord side is picked up on the next run.
    usable_channels: Mutex<HashSet<String>>,
}

#[derive(Deserialize)]
struct ChannelResponse {
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: [&'a Embed; 1],
    components: &'a [ActionRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_mentions: Option<AllowedMentions<'a>>,
}

#[derive(Serialize)]
struct AllowedMentions<'a> {
    parse: [&'a str; 0],
    roles: [&'a str; 1],
}

impl DiscordPublisher {
    /// Create a publisher for `base_url` (e.g. `https://discord.com/api/v10`).
    ///
    /// Plain HTTP is rejected except for localhost, so the bot token is never
    /// sent in the clear.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: SecretString,
    ) -> Result<Self, PublishError> {
        let base_url = base_url.trim_end_matches('/');
        if !base_url.starts_with("https://") {
            let is_localhost = base_url.starts_with("http://127.0.0.1")
                || base_url.starts_with("http://localhost");
            if !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS Discord API base URL");
                return Err(PublishError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base_url, "Using non-HTTPS Discord API base URL (localhost only)");
        }

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token,
            usable_channels: Mutex::new(HashSet::new()),
        })
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}", self.base_url, channel_id)
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    fn is_known_usable(&self, channel_id: &str) -> bool {
        self.usable_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel_id)
    }
}

#[async_trait]
impl Publisher for DiscordPublisher {
    async fn channel_usable(&self, channel_id: &str) -> Result<bool, PublishError> {
        if self.is_known_usable(channel_id) {
            return Ok(true);
        }

        let response = self
            .client
            .get(self.channel_url(channel_id))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            tracing::debug!(channel = %channel_id, status = status.as_u16(), "Channel not accessible");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let channel: ChannelResponse = response.json().await?;
        let usable = MESSAGEABLE_CHANNEL_TYPES.contains(&channel.kind);
        if usable {
            self.usable_channels
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(channel_id.to_string());
        } else {
            tracing::debug!(channel = %channel_id, kind = channel.kind, "Channel does not accept messages");
        }
        Ok(usable)
    }

    async fn send(&self, channel_id: &str, notification: &Notification) -> Result<(), PublishError> {
        let mention = notification.mention.as_ref();
        let payload = CreateMessage {
            content: mention.map(|m| m.content()),
            embeds: [&notification.embed],
            components: &notification.components,
            allowed_mentions: mention.map(|m| AllowedMentions {
                parse: [],
                roles: [m.role_id.as_str()],
            }),
        };

        let response = self
            .client
            .post(format!("{}/messages", self.channel_url(channel_id)))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        tracing::debug!(channel = %channel_id, url = %notification.embed.url, "Notification sent");
        Ok(())
    }
}

async fn api_error(response: reqwest::Response) -> PublishError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = crate::util::truncate_chars(body.trim(), MAX_ERROR_BODY).into_owned();
    PublishError::Api { status, message }
}
