//! Chat-platform side effects consumed by the bet engine.
//!
//! The engine only talks to the `Notifier` trait. Implementations:
//! - `DiscordNotifier`: REST calls against the Discord API
//! - `LogNotifier`: dry-run mode, logs every call and keeps posted
//!   announcements in memory

pub mod discord;
pub mod log;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use wager_common::{ChannelRef, MessageRef};

use crate::bet::render::{Announcement, LiveMessage};

pub use discord::DiscordNotifier;
pub use log::LogNotifier;

/// Errors from the chat platform.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: status {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Outcome of editing an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// The message or its channel no longer exists.
    NotFound,
}

/// Messaging and moderation operations.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a new announcement and return where it landed.
    async fn post_announcement(
        &self,
        channel: &ChannelRef,
        announcement: &Announcement,
    ) -> Result<MessageRef, NotifyError>;

    /// Content and embed currently shown by a message.
    ///
    /// Returns `None` if the message or channel is gone.
    async fn fetch_announcement(
        &self,
        message: &MessageRef,
    ) -> Result<Option<LiveMessage>, NotifyError>;

    /// Replace an announcement's content, embed and controls.
    async fn edit_announcement(
        &self,
        message: &MessageRef,
        announcement: &Announcement,
    ) -> Result<EditOutcome, NotifyError>;

    /// Reply under a message.
    async fn reply_to_announcement(&self, message: &MessageRef, text: &str)
        -> Result<(), NotifyError>;

    /// Plain message in a channel.
    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<(), NotifyError>;

    /// Time out a member of the channel's guild for `duration`.
    async fn apply_timed_penalty(
        &self,
        channel: &ChannelRef,
        user_id: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<(), NotifyError>;
}
