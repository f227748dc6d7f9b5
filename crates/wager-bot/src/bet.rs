//! Timed team bets.
//!
//! A bet is posted as an announcement with two join buttons, collects
//! participants until its resolution time, then a fair coin picks the
//! winning side. Losers get a timed penalty and, if configured, winners get
//! a currency reward.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──► open (toggles 0..N) ──► timer fires ──► resolved (terminal)
//! ```
//!
//! The store is the source of truth. `winning_side` moving from `None` to
//! `Some` is the one irreversible transition; everything after that commit
//! is best-effort.
//!
//! ## Modules
//!
//! - `engine`: create / toggle / resolve / refresh / recover
//! - `timer`: one pending wake-up per bet
//! - `lock`: per-bet serialization of read-modify-write
//! - `render`: announcement content and embed
//! - `draft`: turning the create-bet form into a draft
//! - `schedule`: recurring daily bets per guild

pub mod draft;
pub mod engine;
pub mod lock;
pub mod render;
pub mod schedule;
pub mod timer;

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wager_common::{MessageRef, Side, StoreError};

use crate::notify::NotifyError;

/// Store namespace for bet records.
pub const BETS_NAMESPACE: &str = "bets";

/// Longest penalty in hours; Discord caps member timeouts at 28 days.
pub const MAX_PENALTY_HOURS: u32 = 28 * 24;

/// Errors surfaced by bet operations.
#[derive(Debug, Error)]
pub enum BetError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("Invalid bet: {0}")]
    Invalid(String),
}

/// The persisted bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_description: String,
    /// Automated currency credit for each winner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_reward: Option<u64>,
    pub resolution_time: DateTime<FixedOffset>,
    /// Timeout applied to losers, anchored at `resolution_time`.
    pub penalty_hours: Decimal,
    /// The posted announcement.
    pub message: MessageRef,
    /// user id -> chosen side
    #[serde(default)]
    pub participants: BTreeMap<String, Side>,
    pub host_name: String,
    pub host_avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_role_id: Option<String>,
    /// Absent while open. Set exactly once by resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_side: Option<Side>,
}

impl BetRecord {
    /// Assemble a fresh record from a draft and the posted message.
    pub fn from_draft(draft: BetDraft, message: MessageRef) -> Self {
        Self {
            id: draft.id,
            title: draft.title,
            description: draft.description,
            reward_description: draft.reward_description,
            currency_reward: draft.currency_reward,
            resolution_time: draft.resolution_time,
            penalty_hours: draft.penalty_hours,
            message,
            participants: BTreeMap::new(),
            host_name: draft.host_name,
            host_avatar_url: draft.host_avatar_url,
            ping_role_id: draft.ping_role_id,
            winning_side: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.winning_side.is_some()
    }

    /// Open for entries at `now`.
    pub fn accepts_entries(&self, now: DateTime<Utc>) -> bool {
        !self.is_resolved() && self.resolution_time.with_timezone(&Utc) >= now
    }

    /// Split participants into (winners, losers) for `winner`.
    pub fn partition(&self, winner: Side) -> (Vec<String>, Vec<String>) {
        let mut winners = Vec::new();
        let mut losers = Vec::new();
        for (user, side) in &self.participants {
            if *side == winner {
                winners.push(user.clone());
            } else {
                losers.push(user.clone());
            }
        }
        (winners, losers)
    }

    pub fn view(&self) -> render::BetView<'_> {
        render::BetView {
            id: &self.id,
            title: &self.title,
            description: &self.description,
            reward_description: &self.reward_description,
            resolution_time: self.resolution_time,
            penalty_hours: self.penalty_hours,
            participants: &self.participants,
            host_name: &self.host_name,
            host_avatar_url: &self.host_avatar_url,
            ping_role_id: self.ping_role_id.as_deref(),
            winning_side: self.winning_side,
        }
    }
}

/// Everything needed to post a bet, before it has a message.
#[derive(Debug, Clone, PartialEq)]
pub struct BetDraft {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_description: String,
    pub currency_reward: Option<u64>,
    pub resolution_time: DateTime<FixedOffset>,
    pub penalty_hours: Decimal,
    pub host_name: String,
    pub host_avatar_url: String,
    pub ping_role_id: Option<String>,
}

static NO_PARTICIPANTS: BTreeMap<String, Side> = BTreeMap::new();

impl BetDraft {
    pub fn view(&self) -> render::BetView<'_> {
        render::BetView {
            id: &self.id,
            title: &self.title,
            description: &self.description,
            reward_description: &self.reward_description,
            resolution_time: self.resolution_time,
            penalty_hours: self.penalty_hours,
            participants: &NO_PARTICIPANTS,
            host_name: &self.host_name,
            host_avatar_url: &self.host_avatar_url,
            ping_role_id: self.ping_role_id.as_deref(),
            winning_side: None,
        }
    }
}

/// Result of a participant button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Joined (or switched to) a side.
    Joined(Side),
    /// Pressed the side already chosen; entry removed.
    Withdrawn,
    /// Bet missing, past its resolution time, or already resolved.
    Expired,
}

impl ToggleOutcome {
    /// Ephemeral reply shown to the user who pressed the button.
    pub fn reply_text(&self) -> String {
        match self {
            ToggleOutcome::Joined(side) => format!(
                "You joined the bet with team {}. Good luck!",
                side.display_name()
            ),
            ToggleOutcome::Withdrawn => "You left the bet.".to_string(),
            ToggleOutcome::Expired => "This bet is no longer open.".to_string(),
        }
    }
}

/// Result of a resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// This call committed the winner.
    Resolved(ResolutionReport),
    /// A winner was already recorded; nothing was done.
    AlreadyResolved(Side),
    /// No record with that id.
    NotFound,
}

/// What a resolution did after its commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    pub bet_id: String,
    pub winning_side: Option<Side>,
    pub winners: Vec<String>,
    pub losers: Vec<String>,
    pub display_refreshed: bool,
    pub announced: bool,
    pub penalties_applied: usize,
    pub penalties_failed: usize,
    pub penalties_skipped: usize,
    pub credits_sent: usize,
    pub credits_failed: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use wager_common::ChannelRef;

    pub(crate) fn sample_record() -> BetRecord {
        BetRecord {
            id: "bet-1".to_string(),
            title: "Friday bet".to_string(),
            description: "Pick a team".to_string(),
            reward_description: "Bragging rights".to_string(),
            currency_reward: None,
            resolution_time: (Utc::now() + Duration::hours(1)).fixed_offset(),
            penalty_hours: dec!(2),
            message: MessageRef::new(ChannelRef::new("g1", "c1"), "m1"),
            participants: BTreeMap::new(),
            host_name: "Host".to_string(),
            host_avatar_url: "https://cdn.example/avatar.png".to_string(),
            ping_role_id: None,
            winning_side: None,
        }
    }

    #[test]
    fn test_accepts_entries() {
        let mut record = sample_record();
        assert!(record.accepts_entries(Utc::now()));

        record.resolution_time = (Utc::now() - Duration::seconds(1)).fixed_offset();
        assert!(!record.accepts_entries(Utc::now()));

        let mut resolved = sample_record();
        resolved.winning_side = Some(Side::SideA);
        assert!(!resolved.accepts_entries(Utc::now()));
    }

    #[test]
    fn test_partition() {
        let mut record = sample_record();
        record.participants.insert("u1".to_string(), Side::SideA);
        record.participants.insert("u2".to_string(), Side::SideB);
        record.participants.insert("u3".to_string(), Side::SideA);

        let (winners, losers) = record.partition(Side::SideA);
        assert_eq!(winners, vec!["u1".to_string(), "u3".to_string()]);
        assert_eq!(losers, vec!["u2".to_string()]);
    }

    #[test]
    fn test_record_serde_shape() {
        let mut record = sample_record();
        record.participants.insert("u1".to_string(), Side::SideB);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["participants"]["u1"], "TEAM_2");
        assert!(json.get("winning_side").is_none());
        assert!(json.get("currency_reward").is_none());

        let back: BetRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_toggle_reply_text() {
        assert!(ToggleOutcome::Joined(Side::SideB).reply_text().contains("White"));
        assert_eq!(ToggleOutcome::Withdrawn.reply_text(), "You left the bet.");
        assert!(ToggleOutcome::Expired.reply_text().contains("no longer open"));
    }
}
