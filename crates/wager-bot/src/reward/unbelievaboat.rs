//! UnbelievaBoat economy API client.
//!
//! ## Endpoints
//!
//! - `PATCH /guilds/{guild}/users/{user}` - add to a member's cash or bank balance

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{RewardError, RewardSink};

/// Default UnbelievaBoat API base URL.
pub const DEFAULT_API_BASE: &str = "https://unbelievaboat.com/api/v1";

/// Request timeout for balance updates.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize, PartialEq)]
struct BalanceUpdate<'a> {
    bank: u64,
    reason: &'a str,
}

/// Balance client for UnbelievaBoat.
pub struct UnbelievaBoatClient {
    http: Client,
    base_url: String,
}

impl UnbelievaBoatClient {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Optional API base URL. Defaults to production.
    pub fn new(base_url: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }

    fn balance_url(&self, guild_id: &str, user_id: &str) -> String {
        format!("{}/guilds/{}/users/{}", self.base_url, guild_id, user_id)
    }
}

#[async_trait]
impl RewardSink for UnbelievaBoatClient {
    async fn credit_balance(
        &self,
        token: &str,
        guild_id: &str,
        user_id: &str,
        amount: u64,
        memo: &str,
    ) -> Result<(), RewardError> {
        let url = self.balance_url(guild_id, user_id);
        debug!(url = %url, amount, "Crediting balance");

        let response = self
            .http
            .patch(&url)
            .header("Authorization", token)
            .json(&BalanceUpdate { bank: amount, reason: memo })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %body,
                user_id = %user_id,
                "UnbelievaBoat API error"
            );
            return Err(RewardError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_url() {
        let client = UnbelievaBoatClient::new(Some("http://localhost:9000".to_string()));
        assert_eq!(
            client.balance_url("g1", "u1"),
            "http://localhost:9000/guilds/g1/users/u1"
        );
    }

    #[test]
    fn test_balance_update_body() {
        let body = serde_json::to_value(BalanceUpdate {
            bank: 500,
            reason: "bet-1 | Derby",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"bank": 500, "reason": "bet-1 | Derby"}));
    }
}
