//! Discord REST notifier.
//!
//! ## Endpoints
//!
//! - `POST /channels/{channel}/messages` - post announcements, replies and channel messages
//! - `GET /channels/{channel}/messages/{message}` - read the live announcement
//! - `PATCH /channels/{channel}/messages/{message}` - edit the announcement
//! - `PATCH /guilds/{guild}/members/{user}` - member timeout
//!
//! Both a missing message and a missing channel answer 404, which maps to
//! "not found" instead of an error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use wager_common::{ChannelRef, MessageRef, Side};

use super::{EditOutcome, Notifier, NotifyError};
use crate::bet::render::{
    join_button_id, Announcement, Controls, Embed, LiveMessage, FINISHED_BUTTON_ID,
};

/// Default Discord API base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Request timeout for Discord API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest timeout Discord accepts.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);

/// Discord component type ids.
const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const BUTTON_STYLE_PRIMARY: u8 = 1;
const BUTTON_STYLE_SECONDARY: u8 = 2;

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FetchedMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    embeds: Vec<Embed>,
}

/// Notifier backed by the Discord REST API.
pub struct DiscordNotifier {
    http: Client,
    base_url: String,
    token: String,
}

impl DiscordNotifier {
    /// Create a notifier authenticating as a bot.
    ///
    /// # Arguments
    ///
    /// * `token` - Bot token.
    /// * `base_url` - Optional API base URL. Defaults to v10 production.
    pub fn new(token: impl Into<String>, base_url: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token: token.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    fn messages_url(&self, channel: &ChannelRef) -> String {
        format!("{}/channels/{}/messages", self.base_url, channel.channel_id)
    }

    fn message_url(&self, message: &MessageRef) -> String {
        format!(
            "{}/channels/{}/messages/{}",
            self.base_url, message.channel.channel_id, message.message_id
        )
    }

    /// Turn a non-success status into an error.
    async fn check(response: Response, what: &str) -> Result<Response, NotifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, what = %what, "Discord API error");
        Err(NotifyError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// JSON body for posting or editing an announcement.
pub(crate) fn announcement_body(announcement: &Announcement) -> Value {
    let components = match &announcement.controls {
        Controls::Open { bet_id } => {
            let buttons: Vec<Value> = Side::ALL
                .iter()
                .map(|side| {
                    json!({
                        "type": BUTTON,
                        "style": BUTTON_STYLE_PRIMARY,
                        "custom_id": join_button_id(*side, bet_id),
                        "label": format!("Team {}", side.display_name()),
                        "emoji": { "name": side.emoji() },
                    })
                })
                .collect();
            json!([{ "type": ACTION_ROW, "components": buttons }])
        }
        Controls::Finished => json!([{
            "type": ACTION_ROW,
            "components": [{
                "type": BUTTON,
                "style": BUTTON_STYLE_SECONDARY,
                "custom_id": FINISHED_BUTTON_ID,
                "label": "Bet finished",
                "disabled": true,
            }],
        }]),
    };

    let roles: Vec<&str> = announcement.mention_role.iter().map(String::as_str).collect();

    json!({
        "content": announcement.content.clone().unwrap_or_default(),
        "embeds": [announcement.embed],
        "components": components,
        "allowed_mentions": { "parse": [], "roles": roles },
    })
}

/// RFC 3339 end of a timeout starting now, clamped to what Discord accepts.
pub(crate) fn timeout_until(duration: Duration) -> String {
    let duration = duration.min(MAX_TIMEOUT);
    let end = Utc::now()
        + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    end.to_rfc3339()
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn post_announcement(
        &self,
        channel: &ChannelRef,
        announcement: &Announcement,
    ) -> Result<MessageRef, NotifyError> {
        let url = self.messages_url(channel);
        debug!(url = %url, "Posting announcement");

        let response = self
            .authorized(self.http.post(&url))
            .json(&announcement_body(announcement))
            .send()
            .await?;
        let response = Self::check(response, "post announcement").await?;
        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| NotifyError::InvalidResponse(format!("Created message: {}", e)))?;

        Ok(MessageRef::new(channel.clone(), created.id))
    }

    async fn fetch_announcement(
        &self,
        message: &MessageRef,
    ) -> Result<Option<LiveMessage>, NotifyError> {
        let response = self
            .authorized(self.http.get(self.message_url(message)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(message_id = %message.message_id, "Announcement not found");
            return Ok(None);
        }
        let response = Self::check(response, "fetch announcement").await?;
        let fetched: FetchedMessage = response
            .json()
            .await
            .map_err(|e| NotifyError::InvalidResponse(format!("Fetched message: {}", e)))?;

        Ok(Some(LiveMessage {
            content: Some(fetched.content),
            embed: fetched.embeds.into_iter().next(),
        }))
    }

    async fn edit_announcement(
        &self,
        message: &MessageRef,
        announcement: &Announcement,
    ) -> Result<EditOutcome, NotifyError> {
        let response = self
            .authorized(self.http.patch(self.message_url(message)))
            .json(&announcement_body(announcement))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(EditOutcome::NotFound);
        }
        Self::check(response, "edit announcement").await?;
        debug!(message_id = %message.message_id, "Announcement edited");
        Ok(EditOutcome::Edited)
    }

    async fn reply_to_announcement(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "content": text,
            "message_reference": {
                "message_id": message.message_id,
                "fail_if_not_exists": false,
            },
            "allowed_mentions": { "parse": ["users"] },
        });
        let response = self
            .authorized(self.http.post(self.messages_url(&message.channel)))
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotifyError::NotFound(format!(
                "channel {}",
                message.channel.channel_id
            )));
        }
        Self::check(response, "reply").await?;
        Ok(())
    }

    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<(), NotifyError> {
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": ["users"] },
        });
        let response = self
            .authorized(self.http.post(self.messages_url(channel)))
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotifyError::NotFound(format!("channel {}", channel.channel_id)));
        }
        Self::check(response, "channel message").await?;
        Ok(())
    }

    async fn apply_timed_penalty(
        &self,
        channel: &ChannelRef,
        user_id: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<(), NotifyError> {
        if duration > MAX_TIMEOUT {
            warn!(
                user_id = %user_id,
                requested_secs = duration.as_secs(),
                "Timeout longer than Discord allows, clamping"
            );
        }
        let url = format!(
            "{}/guilds/{}/members/{}",
            self.base_url, channel.guild_id, user_id
        );
        let body = json!({ "communication_disabled_until": timeout_until(duration) });
        let response = self
            .authorized(self.http.patch(&url))
            .header("X-Audit-Log-Reason", reason)
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotifyError::NotFound(format!("member {}", user_id)));
        }
        Self::check(response, "member timeout").await?;
        Ok(())
    }
}
