//! Announcement rendering.
//!
//! The announcement is rendered purely from bet state, so two renders of the
//! same state are structurally equal. Display refresh relies on that to skip
//! edits whose content and embed would not change.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wager_common::Side;

/// Custom id prefix of the join buttons.
pub const JOIN_BUTTON_PREFIX: &str = "enter-team";

/// Custom id of the disabled button shown once a bet is over.
pub const FINISHED_BUTTON_ID: &str = "finished";

/// Participant count is appended to the field name from this many on.
const PARTICIPANT_COUNT_THRESHOLD: usize = 10;

/// Mentions listed before collapsing into "and N others".
const MAX_LISTED_PARTICIPANTS: usize = 43;

pub const COLOR_OPEN: u32 = 0xF1C40F;
pub const COLOR_SIDE_A: u32 = 0x2C2F33;
pub const COLOR_SIDE_B: u32 = 0xFFFFFF;

/// Borrowed view of the fields rendering needs.
#[derive(Debug, Clone, Copy)]
pub struct BetView<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub reward_description: &'a str,
    pub resolution_time: DateTime<FixedOffset>,
    pub penalty_hours: Decimal,
    pub participants: &'a BTreeMap<String, Side>,
    pub host_name: &'a str,
    pub host_avatar_url: &'a str,
    pub ping_role_id: Option<&'a str>,
    pub winning_side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Rich embed of the announcement. Unknown fields of a fetched embed are
/// ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

/// Interactive controls under the announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controls {
    /// One join button per side.
    Open { bet_id: String },
    /// A single disabled "bet finished" button.
    Finished,
}

/// What the live message currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
}

/// A fully rendered announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub content: Option<String>,
    pub embed: Embed,
    pub controls: Controls,
    /// Role allowed to be pinged by `content`.
    pub mention_role: Option<String>,
}

impl Announcement {
    /// True if `live` already shows this content and embed.
    pub fn same_display(&self, live: &LiveMessage) -> bool {
        normalize(&self.content) == normalize(&live.content)
            && live.embed.as_ref() == Some(&self.embed)
    }
}

fn normalize(content: &Option<String>) -> Option<&str> {
    content.as_deref().filter(|c| !c.is_empty())
}

/// Custom id of a join button.
pub fn join_button_id(side: Side, bet_id: &str) -> String {
    format!("{}|{}|{}", JOIN_BUTTON_PREFIX, side.as_str(), bet_id)
}

/// Render the announcement for the given state.
pub fn render_announcement(view: &BetView<'_>) -> Announcement {
    let participant_count = view.participants.len();

    let mut fields = vec![
        EmbedField {
            name: "Winners receive".to_string(),
            value: view.reward_description.to_string(),
            inline: false,
        },
        EmbedField {
            name: "Losers receive".to_string(),
            value: format!("Timeout for **{}h**!", view.penalty_hours.normalize()),
            inline: false,
        },
    ];

    match view.winning_side {
        Some(side) => fields.push(EmbedField {
            name: "Result".to_string(),
            value: if participant_count > 0 {
                format!("**{} Team {} won.**", side.emoji(), side.display_name())
            } else {
                "Not enough participants to finish this bet.".to_string()
            },
            inline: false,
        }),
        None => fields.push(EmbedField {
            name: "Results announced".to_string(),
            value: format!("<t:{}:R>", view.resolution_time.timestamp()),
            inline: false,
        }),
    }

    let count_suffix = if participant_count >= PARTICIPANT_COUNT_THRESHOLD {
        format!(" ({})", participant_count)
    } else {
        String::new()
    };
    fields.push(EmbedField {
        name: format!("Participants{}", count_suffix),
        value: participant_list(view.participants),
        inline: false,
    });

    let color = match view.winning_side {
        None => COLOR_OPEN,
        Some(Side::SideA) => COLOR_SIDE_A,
        Some(Side::SideB) => COLOR_SIDE_B,
    };

    let embed = Embed {
        title: Some(view.title.to_string()),
        description: Some(format!(
            "{}\n\nPick a team with one of the buttons below to take part.",
            view.description
        )),
        fields,
        color: Some(color),
        footer: Some(EmbedFooter {
            text: format!("Hosted by {} | {}", view.host_name, view.id),
            icon_url: Some(view.host_avatar_url.to_string()).filter(|u| !u.is_empty()),
        }),
    };

    let controls = if view.winning_side.is_some() {
        Controls::Finished
    } else {
        Controls::Open {
            bet_id: view.id.to_string(),
        }
    };

    Announcement {
        content: view.ping_role_id.map(|role| format!("<@&{}>", role)),
        embed,
        controls,
        mention_role: view.ping_role_id.map(str::to_string),
    }
}

fn participant_list(participants: &BTreeMap<String, Side>) -> String {
    if participants.is_empty() {
        return "*nobody*".to_string();
    }

    let mentions: Vec<String> = participants
        .keys()
        .take(MAX_LISTED_PARTICIPANTS)
        .map(|id| format!("<@{}>", id))
        .collect();
    let mut list = mentions.join(", ");

    if participants.len() > MAX_LISTED_PARTICIPANTS {
        list.push_str(&format!(
            ", and {} others",
            participants.len() - MAX_LISTED_PARTICIPANTS
        ));
    }
    list
}

/// Reply under the announcement naming the winners.
pub fn winners_message(winner: Side, winners: &[String]) -> String {
    let sub = if winners.is_empty() {
        "But it has no members...".to_string()
    } else {
        format!(
            "Congratulations to:\n{}.\n\nRewards will arrive shortly.",
            winners
                .iter()
                .map(|id| format!("* <@{}>", id))
                .collect::<Vec<_>>()
                .join(";\n")
        )
    };
    format!(
        "## {} Team {} wins!\n\n{}",
        winner.emoji(),
        winner.display_name(),
        sub
    )
}

/// Channel message naming the losers and their penalty.
pub fn losers_message(loser: Side, losers: &[String], penalty_hours: Decimal) -> String {
    let sub = if losers.is_empty() {
        "But it has no members...".to_string()
    } else {
        format!(
            "The following members get a {} hour timeout: {}.",
            penalty_hours.normalize(),
            losers
                .iter()
                .map(|id| format!("<@{}>", id))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    format!(
        "### Team {} lost...\n\n{}\n\nThanks for playing! Good luck next time!",
        loser.display_name(),
        sub
    )
}
