//! Recurring daily bets.
//!
//! A guild may configure a template that is posted every day at `post_hour`
//! and resolves at the next `result_hour`. Hours are local to the configured
//! timezone.
//!
//! The scheduler polls the guild settings, so edits are picked up within
//! `max_sleep`. A post time that passed before the scheduler started is not
//! caught up, so a restart never posts the same day twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use wager_common::ChannelRef;

use super::draft::new_bet_id;
use super::engine::BetEngine;
use super::{BetDraft, BetError, BetRecord};

/// Fields of a daily bet that do not change from day to day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetTemplate {
    pub title: String,
    pub description: String,
    pub reward_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_reward: Option<u64>,
    pub penalty_hours: Decimal,
    pub host_name: String,
    #[serde(default)]
    pub host_avatar_url: String,
}

/// A guild's daily bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildScheduleConfig {
    pub channel_id: String,
    /// Local hour the bet is posted.
    pub post_hour: u32,
    /// Local hour the bet resolves.
    pub result_hour: u32,
    pub template: BetTemplate,
}

/// Today's `hour:00` in `tz`, or the next day's if that instant is not
/// strictly after `after`.
///
/// Days where `hour:00` does not exist (DST gap) are skipped. Returns
/// `None` for an hour outside 0..=23.
pub fn next_local_occurrence(hour: u32, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let today = after.with_timezone(&tz).date_naive();
    (0..=2)
        .filter_map(|offset| local_hour(today + Duration::days(offset), hour, tz))
        .find(|time| *time > after)
}

fn local_hour(date: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|time| time.with_timezone(&Utc))
}

/// Result of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Ids of the bets posted in this pass.
    pub posted: Vec<String>,
    /// How long to wait before the next pass.
    pub sleep: StdDuration,
}

/// Posts each guild's daily bet.
pub struct DailyScheduler {
    engine: Arc<BetEngine>,
    timezone: Tz,
    max_sleep: StdDuration,
    started_at: DateTime<Utc>,
    /// guild id -> local date of the last post
    last_posted: HashMap<String, NaiveDate>,
}

impl DailyScheduler {
    pub fn new(engine: Arc<BetEngine>, timezone: Tz, max_sleep: StdDuration) -> Self {
        Self {
            engine,
            timezone,
            max_sleep,
            started_at: Utc::now(),
            last_posted: HashMap::new(),
        }
    }

    /// Treat post times from `started_at` on as due.
    pub fn with_start(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(timezone = %self.timezone, "Daily scheduler started");

        loop {
            let sleep = match self.tick(Utc::now()).await {
                Ok(report) => report.sleep,
                Err(e) => {
                    warn!(error = %e, "Daily scheduler pass failed");
                    self.max_sleep
                }
            };
            debug!(sleep_secs = sleep.as_secs(), "Daily scheduler sleeping");

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = shutdown.recv() => {
                    info!("Daily scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Post every due daily bet and compute the next wake-up.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, BetError> {
        let tz = self.timezone;
        let today = now.with_timezone(&tz).date_naive();
        let mut report = TickReport::default();
        let mut next_wake: Option<DateTime<Utc>> = None;

        let configs = self.engine.guilds().all_bet_configs().await?;
        for (guild_id, config) in configs {
            let Some(schedule) = config.schedule else {
                continue;
            };

            let due = local_hour(today, schedule.post_hour, tz)
                .filter(|post_at| *post_at <= now && *post_at >= self.started_at);
            if due.is_some() && self.last_posted.get(&guild_id) != Some(&today) {
                match self
                    .post(&guild_id, &schedule, config.ping_role_id.clone(), now)
                    .await
                {
                    Ok(record) => {
                        self.last_posted.insert(guild_id.clone(), today);
                        report.posted.push(record.id);
                    }
                    Err(e) => warn!(guild_id = %guild_id, error = %e, "Failed to post daily bet"),
                }
            }

            if let Some(next) = next_local_occurrence(schedule.post_hour, now, tz) {
                next_wake = Some(next_wake.map_or(next, |wake| wake.min(next)));
            }
        }

        report.sleep = next_wake
            .and_then(|wake| (wake - now).to_std().ok())
            .map_or(self.max_sleep, |until| until.min(self.max_sleep));
        Ok(report)
    }

    async fn post(
        &self,
        guild_id: &str,
        schedule: &GuildScheduleConfig,
        ping_role_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BetRecord, BetError> {
        let resolution_time = next_local_occurrence(schedule.result_hour, now, self.timezone)
            .ok_or_else(|| {
                BetError::Invalid(format!("result hour {} out of range", schedule.result_hour))
            })?;

        let template = &schedule.template;
        let draft = BetDraft {
            id: new_bet_id(),
            title: template.title.clone(),
            description: template.description.clone(),
            reward_description: template.reward_description.clone(),
            currency_reward: template.currency_reward,
            resolution_time: resolution_time.with_timezone(&self.timezone).fixed_offset(),
            penalty_hours: template.penalty_hours,
            host_name: template.host_name.clone(),
            host_avatar_url: template.host_avatar_url.clone(),
            ping_role_id,
        };

        let channel = ChannelRef::new(guild_id, schedule.channel_id.clone());
        let record = self.engine.create_bet(&channel, draft).await?;
        info!(guild_id = %guild_id, bet_id = %record.id, "Posted daily bet");
        Ok(record)
    }
}
