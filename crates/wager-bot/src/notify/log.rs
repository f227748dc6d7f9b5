//! Logging notifier for dry runs.
//!
//! Never touches the network. Posted announcements are kept in memory so
//! display refreshes behave as they would against a real channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use wager_common::{ChannelRef, MessageRef};

use super::{EditOutcome, Notifier, NotifyError};
use crate::bet::render::{Announcement, LiveMessage};

/// Notifier that logs instead of sending.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
    posted: DashMap<MessageRef, LiveMessage>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of announcements posted so far.
    pub fn posted_count(&self) -> usize {
        self.posted.len()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn post_announcement(
        &self,
        channel: &ChannelRef,
        announcement: &Announcement,
    ) -> Result<MessageRef, NotifyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let message = MessageRef::new(channel.clone(), format!("dry-run-{}", id));
        info!(
            channel_id = %channel.channel_id,
            message_id = %message.message_id,
            title = ?announcement.embed.title,
            "Dry run: announcement posted"
        );
        self.posted.insert(
            message.clone(),
            LiveMessage {
                content: announcement.content.clone(),
                embed: Some(announcement.embed.clone()),
            },
        );
        Ok(message)
    }

    async fn fetch_announcement(
        &self,
        message: &MessageRef,
    ) -> Result<Option<LiveMessage>, NotifyError> {
        Ok(self.posted.get(message).map(|m| m.value().clone()))
    }

    async fn edit_announcement(
        &self,
        message: &MessageRef,
        announcement: &Announcement,
    ) -> Result<EditOutcome, NotifyError> {
        match self.posted.get_mut(message) {
            Some(mut live) => {
                *live = LiveMessage {
                    content: announcement.content.clone(),
                    embed: Some(announcement.embed.clone()),
                };
                info!(message_id = %message.message_id, "Dry run: announcement edited");
                Ok(EditOutcome::Edited)
            }
            None => Ok(EditOutcome::NotFound),
        }
    }

    async fn reply_to_announcement(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), NotifyError> {
        info!(message_id = %message.message_id, text = %text, "Dry run: reply");
        Ok(())
    }

    async fn send_to_channel(&self, channel: &ChannelRef, text: &str) -> Result<(), NotifyError> {
        info!(channel_id = %channel.channel_id, text = %text, "Dry run: channel message");
        Ok(())
    }

    async fn apply_timed_penalty(
        &self,
        channel: &ChannelRef,
        user_id: &str,
        duration: Duration,
        reason: &str,
    ) -> Result<(), NotifyError> {
        info!(
            guild_id = %channel.guild_id,
            user_id = %user_id,
            duration_secs = duration.as_secs(),
            reason = %reason,
            "Dry run: member timeout"
        );
        Ok(())
    }
}
