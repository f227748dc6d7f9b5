//! Per-guild settings: ping role, daily schedule and economy credentials.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use wager_common::{Collection, KvBackend, StoreError};

use crate::bet::schedule::GuildScheduleConfig;

/// Store namespace for [`GuildBetConfig`].
pub const BET_CONFIG_NAMESPACE: &str = "bet_config";

/// Store namespace for [`RewardConfig`].
pub const REWARD_CONFIG_NAMESPACE: &str = "unbelievaboat";

/// Currency text used when a guild has not configured one.
pub const DEFAULT_CURRENCY_TEXT: &str = "coins";

/// Bet settings of a guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildBetConfig {
    /// Role mentioned when a bet is posted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_role_id: Option<String>,
    /// Recurring daily bet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<GuildScheduleConfig>,
}

/// Economy service settings of a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_currency_text")]
    pub currency_text: String,
}

fn default_currency_text() -> String {
    DEFAULT_CURRENCY_TEXT.to_string()
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            token: None,
            currency_text: default_currency_text(),
        }
    }
}

impl RewardConfig {
    /// The token, if one is set and not blank.
    pub fn usable_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Read and update guild settings.
#[derive(Clone)]
pub struct GuildSettings {
    bet_configs: Collection<GuildBetConfig>,
    reward_configs: Collection<RewardConfig>,
}

impl GuildSettings {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            bet_configs: Collection::new(Arc::clone(&backend), BET_CONFIG_NAMESPACE),
            reward_configs: Collection::new(backend, REWARD_CONFIG_NAMESPACE),
        }
    }

    /// Bet settings, defaulted when the guild has none.
    pub async fn bet_config(&self, guild_id: &str) -> Result<GuildBetConfig, StoreError> {
        Ok(self.bet_configs.get(guild_id).await?.unwrap_or_default())
    }

    /// Every guild with stored bet settings.
    pub async fn all_bet_configs(&self) -> Result<Vec<(String, GuildBetConfig)>, StoreError> {
        self.bet_configs.entries().await
    }

    pub async fn set_ping_role(
        &self,
        guild_id: &str,
        role_id: Option<String>,
    ) -> Result<(), StoreError> {
        let mut config = self.bet_config(guild_id).await?;
        config.ping_role_id = role_id;
        self.bet_configs.set(guild_id, &config).await?;
        info!(guild_id = %guild_id, ping_role = ?config.ping_role_id, "Updated ping role");
        Ok(())
    }

    pub async fn set_schedule(
        &self,
        guild_id: &str,
        schedule: Option<GuildScheduleConfig>,
    ) -> Result<(), StoreError> {
        let mut config = self.bet_config(guild_id).await?;
        config.schedule = schedule;
        self.bet_configs.set(guild_id, &config).await?;
        info!(
            guild_id = %guild_id,
            enabled = config.schedule.is_some(),
            "Updated daily bet schedule"
        );
        Ok(())
    }

    /// Economy settings, defaulted when the guild has none.
    pub async fn reward_config(&self, guild_id: &str) -> Result<RewardConfig, StoreError> {
        Ok(self.reward_configs.get(guild_id).await?.unwrap_or_default())
    }

    pub async fn set_reward_config(
        &self,
        guild_id: &str,
        token: Option<String>,
        currency_text: Option<String>,
    ) -> Result<(), StoreError> {
        let config = RewardConfig {
            token,
            currency_text: currency_text
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(default_currency_text),
        };
        self.reward_configs.set(guild_id, &config).await?;
        info!(
            guild_id = %guild_id,
            has_token = config.usable_token().is_some(),
            "Updated reward configuration"
        );
        Ok(())
    }
}
