//! Currency rewards for bet winners.
//!
//! Credits go to an external economy service. Credentials are per guild and
//! passed with every call, so one sink serves all guilds.

pub mod unbelievaboat;

use async_trait::async_trait;
use thiserror::Error;

pub use unbelievaboat::UnbelievaBoatClient;

/// Errors from the economy service.
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: status {status}, body: {body}")]
    Api { status: u16, body: String },
}

/// Credits currency to a member.
#[async_trait]
pub trait RewardSink: Send + Sync {
    /// Add `amount` to the member's bank balance.
    ///
    /// # Arguments
    ///
    /// * `token` - The guild's API token for the service.
    /// * `memo` - Reason shown in the service's audit log.
    async fn credit_balance(
        &self,
        token: &str,
        guild_id: &str,
        user_id: &str,
        amount: u64,
        memo: &str,
    ) -> Result<(), RewardError>;
}
