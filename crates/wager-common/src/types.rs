//! Shared types for the wager bot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two teams of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "TEAM_1")]
    SideA,
    #[serde(rename = "TEAM_2")]
    SideB,
}

impl Side {
    /// Both sides, in display order.
    pub const ALL: [Side; 2] = [Side::SideA, Side::SideB];

    /// Returns the persisted tag (e.g., "TEAM_1").
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::SideA => "TEAM_1",
            Side::SideB => "TEAM_2",
        }
    }

    /// Returns the opposing side.
    pub fn other(&self) -> Side {
        match self {
            Side::SideA => Side::SideB,
            Side::SideB => Side::SideA,
        }
    }

    /// Team name shown to users.
    pub fn display_name(&self) -> &'static str {
        match self {
            Side::SideA => "Black",
            Side::SideB => "White",
        }
    }

    /// Emoji shown on buttons and in results.
    pub fn emoji(&self) -> &'static str {
        match self {
            Side::SideA => "\u{2b1b}",
            Side::SideB => "\u{2b1c}",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEAM_1" => Ok(Side::SideA),
            "TEAM_2" => Ok(Side::SideB),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// A text channel inside a guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub guild_id: String,
    pub channel_id: String,
}

impl ChannelRef {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// A posted message, addressed through its channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelRef,
    pub message_id: String,
}

impl MessageRef {
    pub fn new(channel: ChannelRef, message_id: impl Into<String>) -> Self {
        Self {
            channel,
            message_id: message_id.into(),
        }
    }

    /// Public link to the message.
    pub fn jump_url(&self) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.channel.guild_id, self.channel.channel_id, self.message_id
        )
    }
}
