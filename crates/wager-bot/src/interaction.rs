//! Button interaction routing.
//!
//! Custom ids are `|`-separated:
//!
//! - `enter-team|<SIDE>|<betId>` - join button of a bet
//! - `info-list-navigation|<page>|<autoReplyOnly>` - fact list paging

use std::sync::Arc;

use tracing::{debug, warn};

use wager_common::Side;

use crate::bet::engine::BetEngine;
use crate::bet::render::JOIN_BUTTON_PREFIX;
use crate::bet::ToggleOutcome;
use crate::facts::{FactBook, FactError, FactPage};

/// Custom id prefix of the fact list navigation buttons.
pub const LIST_NAVIGATION_PREFIX: &str = "info-list-navigation";

/// Reply shown when a button press could not be processed.
pub const GENERIC_FAILURE_REPLY: &str = "Something went wrong, please try again.";

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    JoinBet { side: Side, bet_id: String },
    ListFacts { page: i64, auto_reply_only: bool },
}

impl ButtonAction {
    /// Parse a custom id. Unknown or malformed ids yield `None`.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(3, '|');
        let prefix = parts.next()?;
        let middle = parts.next()?;
        let last = parts.next()?;

        match prefix {
            JOIN_BUTTON_PREFIX => {
                let side = middle.parse().ok()?;
                if last.is_empty() {
                    return None;
                }
                Some(ButtonAction::JoinBet {
                    side,
                    bet_id: last.to_string(),
                })
            }
            LIST_NAVIGATION_PREFIX => Some(ButtonAction::ListFacts {
                page: middle.parse().ok()?,
                auto_reply_only: last == "true",
            }),
            _ => None,
        }
    }
}

/// Custom id of a fact list navigation button.
pub fn list_navigation_id(page: i64, auto_reply_only: bool) -> String {
    format!("{}|{}|{}", LIST_NAVIGATION_PREFIX, page, auto_reply_only)
}

/// Navigation button ids for a page: (previous, next), `None` when disabled.
pub fn list_navigation(page: &FactPage) -> (Option<String>, Option<String>) {
    let current = page.page as i64;
    (
        page.has_previous()
            .then(|| list_navigation_id(current - 1, page.auto_reply_only)),
        page.has_next()
            .then(|| list_navigation_id(current + 1, page.auto_reply_only)),
    )
}

/// Handle a join button press and return the ephemeral reply.
///
/// Store or platform failures are logged and answered with a generic
/// message; they never reach the gateway loop.
pub async fn handle_bet_button(
    engine: &Arc<BetEngine>,
    bet_id: &str,
    user_id: &str,
    side: Side,
) -> String {
    match engine.toggle_participation(bet_id, user_id, side).await {
        Ok(outcome) => {
            if outcome == ToggleOutcome::Expired {
                debug!(bet_id = %bet_id, user_id = %user_id, "Rejected toggle on closed bet");
            }
            outcome.reply_text()
        }
        Err(e) => {
            warn!(bet_id = %bet_id, user_id = %user_id, error = %e, "Toggle failed");
            GENERIC_FAILURE_REPLY.to_string()
        }
    }
}

/// Handle a fact list navigation press.
pub async fn handle_list_button(
    facts: &FactBook,
    guild_id: &str,
    page: i64,
    auto_reply_only: bool,
) -> Result<FactPage, FactError> {
    facts.list_page(guild_id, page, auto_reply_only).await
}
