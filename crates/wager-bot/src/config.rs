//! Configuration for wager-bot.
//!
//! Loaded from a TOML file, then environment variables for secrets, then
//! command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::bet::draft::DraftContext;
use crate::bet::MAX_PENALTY_HOURS;

/// Top-level configuration for wager-bot.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Logging level.
    pub log_level: String,

    /// Log every platform call instead of performing it.
    pub dry_run: bool,

    /// Key-value store configuration.
    pub store: StoreConfig,

    /// Discord API configuration.
    pub discord: DiscordConfig,

    /// Bet creation parameters.
    pub bets: BetsConfig,

    /// Economy service configuration.
    pub rewards: RewardsConfig,

    /// Daily bet scheduler.
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// JSON file holding every namespace.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/wager.json"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscordConfig {
    /// Bot token. Only read from `DISCORD_TOKEN`.
    pub token: Option<String>,

    /// API base URL override.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BetsConfig {
    /// IANA timezone for naive result times and daily schedules.
    pub timezone: String,

    /// Furthest a result time may be in the future.
    pub max_days_ahead: u32,

    /// Timeout used when the form leaves it empty.
    pub default_penalty_hours: Decimal,
}

impl Default for BetsConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Bucharest".to_string(),
            max_days_ahead: 10,
            default_penalty_hours: Decimal::ONE,
        }
    }
}

impl BetsConfig {
    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", self.timezone, e))
    }

    /// Draft settings for a guild's create-bet form.
    pub fn draft_context(
        &self,
        host_name: impl Into<String>,
        host_avatar_url: impl Into<String>,
        ping_role_id: Option<String>,
        currency_text: impl Into<String>,
    ) -> Result<DraftContext> {
        Ok(DraftContext {
            timezone: self.tz()?,
            max_days_ahead: self.max_days_ahead,
            default_penalty_hours: self.default_penalty_hours,
            host_name: host_name.into(),
            host_avatar_url: host_avatar_url.into(),
            ping_role_id,
            currency_text: currency_text.into(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RewardsConfig {
    /// UnbelievaBoat API base URL override.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Post daily bets.
    pub enabled: bool,

    /// Longest sleep between passes, so schedule edits are picked up.
    pub max_sleep: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sleep: Duration::from_secs(300),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dry_run: false,
            store: StoreConfig::default(),
            discord: DiscordConfig::default(),
            bets: BetsConfig::default(),
            rewards: RewardsConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Ok(Self::from(file))
    }

    /// Apply environment variable overrides for sensitive values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            if !token.trim().is_empty() {
                self.discord.token = Some(token);
            }
        }
        if let Ok(path) = std::env::var("WAGER_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("WAGER_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_cli_overrides(&mut self, log_level: Option<String>, dry_run: bool) {
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if dry_run {
            self.dry_run = true;
        }
    }

    /// Validate configuration and return errors for invalid values.
    pub fn validate(&self) -> Result<()> {
        if !self.dry_run && self.discord.token.is_none() {
            bail!("DISCORD_TOKEN environment variable is required unless running with --dry-run");
        }

        if !matches!(
            self.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            bail!("Unknown log level: {}", self.log_level);
        }

        self.bets.tz()?;
        if self.bets.max_days_ahead == 0 {
            bail!("max_days_ahead must be at least 1");
        }
        if self.bets.default_penalty_hours < Decimal::ZERO {
            bail!("default_penalty_hours must not be negative");
        }
        if self.bets.default_penalty_hours > Decimal::from(MAX_PENALTY_HOURS) {
            bail!("default_penalty_hours must be at most {}", MAX_PENALTY_HOURS);
        }

        if self.scheduler.max_sleep.is_zero() {
            bail!("max_sleep_secs must be at least 1");
        }

        Ok(())
    }
}

// ============================================================================
// TOML deserialization structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    general: GeneralToml,
    #[serde(default)]
    store: StoreToml,
    #[serde(default)]
    discord: DiscordToml,
    #[serde(default)]
    bets: BetsToml,
    #[serde(default)]
    rewards: RewardsToml,
    #[serde(default)]
    scheduler: SchedulerToml,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralToml {
    log_level: String,
    dry_run: bool,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StoreToml {
    path: String,
}

impl Default for StoreToml {
    fn default() -> Self {
        Self {
            path: "data/wager.json".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiscordToml {
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BetsToml {
    timezone: String,
    max_days_ahead: u32,
    default_penalty_hours: f64,
}

impl Default for BetsToml {
    fn default() -> Self {
        Self {
            timezone: "Europe/Bucharest".to_string(),
            max_days_ahead: 10,
            default_penalty_hours: 1.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RewardsToml {
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SchedulerToml {
    enabled: bool,
    max_sleep_secs: u64,
}

impl Default for SchedulerToml {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sleep_secs: 300,
        }
    }
}

/// Convert f64 to Decimal.
fn f64_to_decimal(val: f64) -> Decimal {
    Decimal::try_from(val).unwrap_or(Decimal::ZERO)
}

impl From<TomlConfig> for BotConfig {
    fn from(toml: TomlConfig) -> Self {
        Self {
            log_level: toml.general.log_level,
            dry_run: toml.general.dry_run,
            store: StoreConfig {
                path: PathBuf::from(toml.store.path),
            },
            discord: DiscordConfig {
                token: None, // Set via env var
                api_base: toml.discord.api_base,
            },
            bets: BetsConfig {
                timezone: toml.bets.timezone,
                max_days_ahead: toml.bets.max_days_ahead,
                default_penalty_hours: f64_to_decimal(toml.bets.default_penalty_hours),
            },
            rewards: RewardsConfig {
                api_base: toml.rewards.api_base,
            },
            scheduler: SchedulerConfig {
                enabled: toml.scheduler.enabled,
                max_sleep: Duration::from_secs(toml.scheduler.max_sleep_secs),
            },
        }
    }
}
