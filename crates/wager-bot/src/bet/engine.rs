//! Bet lifecycle engine.
//!
//! Owns the bet store, the timer registry and the per-bet locks, and drives
//! every state transition of a bet:
//!
//! - `create_bet`: post, persist, arm
//! - `toggle_participation`: join / switch / withdraw under the bet's lock
//! - `resolve_bet`: pick, commit, then best-effort side effects
//! - `refresh_display`: re-render and edit the announcement if it changed
//! - `recover_all_pending`: re-arm every open bet after a restart
//!
//! Resolution is idempotent on `winning_side`. Timers are only a wake-up
//! hint; a duplicate fire finds the winner already recorded and returns.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use futures::future::join_all;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use wager_common::{ChannelRef, Collection, KvBackend, Side};

use super::lock::KeyedLocks;
use super::render::{losers_message, render_announcement, winners_message};
use super::timer::TimerRegistry;
use super::{
    BetDraft, BetError, BetRecord, ResolutionReport, ResolveOutcome, ToggleOutcome,
    BETS_NAMESPACE, MAX_PENALTY_HOURS,
};
use crate::guild::GuildSettings;
use crate::notify::{EditOutcome, Notifier};
use crate::reward::RewardSink;

/// Audit log reason attached to loser timeouts.
pub const PENALTY_REASON: &str = "Lost a bet.";

/// Picks the winning side of a bet.
pub trait WinnerPicker: Send + Sync {
    fn pick(&self) -> Side;
}

/// Fair coin. Participant counts per side are deliberately ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoinFlip;

impl WinnerPicker for CoinFlip {
    fn pick(&self) -> Side {
        if rand::thread_rng().gen_bool(0.5) {
            Side::SideA
        } else {
            Side::SideB
        }
    }
}

/// What a display refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Edited,
    /// The live message already shows this state.
    Unchanged,
    /// The announcement message or its channel is gone.
    MessageMissing,
    /// No record with that id.
    BetMissing,
}

/// Counts from a recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub armed: usize,
    pub resolved: usize,
}

/// The bet lifecycle engine.
///
/// Shared as `Arc<BetEngine>`; timers hold a weak reference back to it.
pub struct BetEngine {
    bets: Collection<BetRecord>,
    guilds: GuildSettings,
    notifier: Arc<dyn Notifier>,
    rewards: Option<Arc<dyn RewardSink>>,
    picker: Arc<dyn WinnerPicker>,
    timers: TimerRegistry,
    locks: KeyedLocks,
}

impl BetEngine {
    /// Create an engine over `backend` with a fair coin and a fresh timer
    /// registry.
    pub fn new(backend: Arc<dyn KvBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            bets: Collection::new(Arc::clone(&backend), BETS_NAMESPACE),
            guilds: GuildSettings::new(backend),
            notifier,
            rewards: None,
            picker: Arc::new(CoinFlip),
            timers: TimerRegistry::new(),
            locks: KeyedLocks::new(),
        }
    }

    /// Credit currency rewards through `rewards`.
    pub fn with_rewards(mut self, rewards: Arc<dyn RewardSink>) -> Self {
        self.rewards = Some(rewards);
        self
    }

    /// Replace the coin.
    pub fn with_picker(mut self, picker: Arc<dyn WinnerPicker>) -> Self {
        self.picker = picker;
        self
    }

    /// Share an existing timer registry.
    pub fn with_timers(mut self, timers: TimerRegistry) -> Self {
        self.timers = timers;
        self
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn guilds(&self) -> &GuildSettings {
        &self.guilds
    }

    /// Current stored state of a bet.
    pub async fn get_bet(&self, bet_id: &str) -> Result<Option<BetRecord>, BetError> {
        Ok(self.bets.get(bet_id).await?)
    }

    /// Post the announcement, persist the record and arm its timer.
    pub async fn create_bet(
        self: &Arc<Self>,
        channel: &ChannelRef,
        draft: BetDraft,
    ) -> Result<BetRecord, BetError> {
        if draft.penalty_hours < Decimal::ZERO {
            return Err(BetError::Invalid(format!(
                "penalty hours must not be negative, got {}",
                draft.penalty_hours
            )));
        }
        if draft.penalty_hours > Decimal::from(MAX_PENALTY_HOURS) {
            return Err(BetError::Invalid(format!(
                "penalty hours must be at most {}, got {}",
                MAX_PENALTY_HOURS, draft.penalty_hours
            )));
        }

        let announcement = render_announcement(&draft.view());
        let message = self
            .notifier
            .post_announcement(channel, &announcement)
            .await?;

        let record = BetRecord::from_draft(draft, message);
        self.bets.set(&record.id, &record).await?;
        self.arm_timer(&record.id, record.resolution_time);

        info!(
            bet_id = %record.id,
            guild_id = %channel.guild_id,
            title = %record.title,
            resolution_time = %record.resolution_time,
            "Bet started"
        );
        Ok(record)
    }

    /// Join, switch or withdraw.
    ///
    /// Pressing the side already chosen withdraws. The announcement refresh
    /// runs in the background after the record is persisted.
    pub async fn toggle_participation(
        self: &Arc<Self>,
        bet_id: &str,
        user_id: &str,
        side: Side,
    ) -> Result<ToggleOutcome, BetError> {
        let outcome = {
            let _guard = self.locks.lock(bet_id).await;

            let Some(mut record) = self.bets.get(bet_id).await? else {
                debug!(bet_id = %bet_id, user_id = %user_id, "Toggle on unknown bet");
                return Ok(ToggleOutcome::Expired);
            };
            if !record.accepts_entries(Utc::now()) {
                debug!(bet_id = %bet_id, user_id = %user_id, "Toggle on closed bet");
                return Ok(ToggleOutcome::Expired);
            }

            let outcome = if record.participants.get(user_id) == Some(&side) {
                record.participants.remove(user_id);
                ToggleOutcome::Withdrawn
            } else {
                record.participants.insert(user_id.to_string(), side);
                ToggleOutcome::Joined(side)
            };
            self.bets.set(bet_id, &record).await?;
            outcome
        };

        debug!(bet_id = %bet_id, user_id = %user_id, outcome = ?outcome, "Participation toggled");

        let engine = Arc::clone(self);
        let id = bet_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = engine.refresh_display(&id, false).await {
                warn!(bet_id = %id, error = %e, "Failed to refresh bet message");
            }
        });

        Ok(outcome)
    }

    /// Resolve a bet whose time has come.
    ///
    /// Reads the record fresh under the bet's lock. If a winner is already
    /// recorded nothing happens. Otherwise the coin is flipped and the winner
    /// committed; every later step is best-effort and only logged.
    pub async fn resolve_bet(&self, bet_id: &str) -> Result<ResolveOutcome, BetError> {
        let guard = self.locks.lock(bet_id).await;

        let Some(mut record) = self.bets.get(bet_id).await? else {
            warn!(bet_id = %bet_id, "Resolution for unknown bet");
            return Ok(ResolveOutcome::NotFound);
        };
        if let Some(side) = record.winning_side {
            debug!(bet_id = %bet_id, winner = %side, "Bet already resolved");
            return Ok(ResolveOutcome::AlreadyResolved(side));
        }

        let winner = self.picker.pick();
        record.winning_side = Some(winner);
        if let Err(e) = self.bets.set(bet_id, &record).await {
            error!(bet_id = %bet_id, error = %e, "Failed to commit bet resolution");
            return Err(e.into());
        }

        info!(
            bet_id = %bet_id,
            winner = %winner,
            participants = record.participants.len(),
            "Bet resolved"
        );

        let mut report = ResolutionReport {
            bet_id: bet_id.to_string(),
            winning_side: Some(winner),
            ..Default::default()
        };

        report.display_refreshed = match self.refresh_record(&record, true).await {
            Ok(RefreshOutcome::Edited) => true,
            Ok(outcome) => {
                warn!(bet_id = %bet_id, outcome = ?outcome, "Terminal display not updated");
                false
            }
            Err(e) => {
                warn!(bet_id = %bet_id, error = %e, "Failed to update resolved bet message");
                false
            }
        };
        drop(guard);

        if record.participants.is_empty() {
            info!(bet_id = %bet_id, "Bet resolved without participants");
            return Ok(ResolveOutcome::Resolved(report));
        }

        let (winners, losers) = record.partition(winner);
        report.announced = self.announce_result(&record, winner, &winners, &losers).await;

        let (applied, failed, skipped) = self.apply_penalties(&record, &losers).await;
        report.penalties_applied = applied;
        report.penalties_failed = failed;
        report.penalties_skipped = skipped;

        let (sent, credit_failed) = self.credit_winners(&record, &winners).await;
        report.credits_sent = sent;
        report.credits_failed = credit_failed;

        report.winners = winners;
        report.losers = losers;

        info!(
            bet_id = %bet_id,
            winners = report.winners.len(),
            losers = report.losers.len(),
            penalties_applied = report.penalties_applied,
            penalties_failed = report.penalties_failed,
            credits_sent = report.credits_sent,
            credits_failed = report.credits_failed,
            "Bet side effects completed"
        );
        Ok(ResolveOutcome::Resolved(report))
    }

    /// Re-render a stored bet and edit its announcement.
    ///
    /// Reads the record under the bet's lock, so it never renders a state
    /// older than a committed resolution.
    pub async fn refresh_display(
        &self,
        bet_id: &str,
        force: bool,
    ) -> Result<RefreshOutcome, BetError> {
        let _guard = self.locks.lock(bet_id).await;
        match self.bets.get(bet_id).await? {
            Some(record) => self.refresh_record(&record, force).await,
            None => Ok(RefreshOutcome::BetMissing),
        }
    }

    /// Re-render `record` and edit its announcement.
    ///
    /// Without `force`, the live message is fetched first and the edit is
    /// skipped when content and embed already match.
    pub async fn refresh_record(
        &self,
        record: &BetRecord,
        force: bool,
    ) -> Result<RefreshOutcome, BetError> {
        let announcement = render_announcement(&record.view());

        if !force {
            match self.notifier.fetch_announcement(&record.message).await? {
                None => {
                    debug!(bet_id = %record.id, "Bet message is gone");
                    return Ok(RefreshOutcome::MessageMissing);
                }
                Some(live) if announcement.same_display(&live) => {
                    debug!(bet_id = %record.id, "Skipped updating bet message");
                    return Ok(RefreshOutcome::Unchanged);
                }
                Some(_) => {}
            }
        }

        match self
            .notifier
            .edit_announcement(&record.message, &announcement)
            .await?
        {
            EditOutcome::Edited => Ok(RefreshOutcome::Edited),
            EditOutcome::NotFound => {
                debug!(bet_id = %record.id, "Bet message is gone");
                Ok(RefreshOutcome::MessageMissing)
            }
        }
    }

    /// Schedule resolution of `bet_id` at `fire_at`, replacing any pending
    /// timer for it.
    pub fn arm_timer(self: &Arc<Self>, bet_id: &str, fire_at: DateTime<FixedOffset>) {
        let engine = Arc::downgrade(self);
        let id = bet_id.to_string();
        self.timers
            .arm(bet_id, fire_at.with_timezone(&Utc), move || async move {
                let Some(engine) = engine.upgrade() else {
                    debug!(bet_id = %id, "Engine dropped before timer fired");
                    return;
                };
                match engine.resolve_bet(&id).await {
                    Ok(outcome) => debug!(bet_id = %id, outcome = ?outcome, "Timer fired"),
                    Err(e) => error!(bet_id = %id, error = %e, "Bet resolution failed"),
                }
            });
    }

    /// Arm a timer for every unresolved bet in the store.
    ///
    /// Safe to call repeatedly: re-arming replaces the pending timer.
    pub async fn recover_all_pending(self: &Arc<Self>) -> Result<RecoverySummary, BetError> {
        let mut summary = RecoverySummary::default();

        for (bet_id, record) in self.bets.entries().await? {
            if record.is_resolved() {
                summary.resolved += 1;
                continue;
            }
            self.arm_timer(&bet_id, record.resolution_time);
            summary.armed += 1;
        }

        info!(
            armed = summary.armed,
            resolved = summary.resolved,
            "Recovered pending bets"
        );
        Ok(summary)
    }

    /// Cancel every pending timer. Stored bets are untouched and will be
    /// recovered on next start.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.timers.cancel_all();
        info!(cancelled, "Cancelled pending bet timers");
        cancelled
    }

    /// Winners reply and losers message. True if both were delivered.
    async fn announce_result(
        &self,
        record: &BetRecord,
        winner: Side,
        winners: &[String],
        losers: &[String],
    ) -> bool {
        let reply = self
            .notifier
            .reply_to_announcement(&record.message, &winners_message(winner, winners))
            .await;
        if let Err(e) = &reply {
            warn!(bet_id = %record.id, error = %e, "Failed to announce winners");
        }

        let sent = self
            .notifier
            .send_to_channel(
                &record.message.channel,
                &losers_message(winner.other(), losers, record.penalty_hours),
            )
            .await;
        if let Err(e) = &sent {
            warn!(bet_id = %record.id, error = %e, "Failed to announce losers");
        }

        reply.is_ok() && sent.is_ok()
    }

    /// Time out every loser until `resolution_time + penalty_hours`.
    ///
    /// Returns (applied, failed, skipped).
    async fn apply_penalties(
        &self,
        record: &BetRecord,
        losers: &[String],
    ) -> (usize, usize, usize) {
        if losers.is_empty() {
            return (0, 0, 0);
        }

        let Some(remaining) = remaining_penalty(record, Utc::now()) else {
            info!(
                bet_id = %record.id,
                losers = losers.len(),
                "Penalty already elapsed, skipping timeouts"
            );
            return (0, 0, losers.len());
        };

        let channel = &record.message.channel;
        let results = join_all(losers.iter().map(|user_id| async move {
            let result = self
                .notifier
                .apply_timed_penalty(channel, user_id, remaining, PENALTY_REASON)
                .await;
            if let Err(e) = &result {
                warn!(
                    bet_id = %record.id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to time out loser"
                );
            }
            result.is_ok()
        }))
        .await;

        let applied = results.iter().filter(|ok| **ok).count();
        (applied, results.len() - applied, 0)
    }

    /// Credit `currency_reward` to every winner. Returns (sent, failed).
    async fn credit_winners(&self, record: &BetRecord, winners: &[String]) -> (usize, usize) {
        let amount = match record.currency_reward {
            Some(amount) if amount > 0 => amount,
            _ => return (0, 0),
        };
        if winners.is_empty() {
            return (0, 0);
        }
        let Some(rewards) = &self.rewards else {
            debug!(bet_id = %record.id, "No reward sink, skipping credits");
            return (0, 0);
        };

        let guild_id = &record.message.channel.guild_id;
        let config = match self.guilds.reward_config(guild_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(bet_id = %record.id, error = %e, "Failed to read reward configuration");
                return (0, 0);
            }
        };
        let Some(token) = config.usable_token() else {
            debug!(bet_id = %record.id, guild_id = %guild_id, "No reward token, skipping credits");
            return (0, 0);
        };

        let memo = format!("{} | {}", record.id, record.title);
        let results = join_all(winners.iter().map(|user_id| {
            let memo = memo.as_str();
            async move {
                let result = rewards
                    .credit_balance(token, guild_id, user_id, amount, memo)
                    .await;
                if let Err(e) = &result {
                    warn!(
                        bet_id = %record.id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to credit winner"
                    );
                }
                result.is_ok()
            }
        }))
        .await;

        let sent = results.iter().filter(|ok| **ok).count();
        (sent, results.len() - sent)
    }
}

/// Time left until the anchored penalty end, or `None` if it has passed.
///
/// Penalties are capped at [`MAX_PENALTY_HOURS`]; an end that falls outside
/// the representable range counts as the capped length from now.
pub fn remaining_penalty(record: &BetRecord, now: DateTime<Utc>) -> Option<StdDuration> {
    let max_hours = Decimal::from(MAX_PENALTY_HOURS);
    let hours = record.penalty_hours.min(max_hours);
    let cap = StdDuration::from_secs(u64::from(MAX_PENALTY_HOURS) * 3600);

    let millis = hours
        .checked_mul(Decimal::from(3_600_000))
        .and_then(|millis| millis.trunc().to_i64())?;
    let start = record.resolution_time.with_timezone(&Utc);
    let Some(end) =
        Duration::try_milliseconds(millis).and_then(|length| start.checked_add_signed(length))
    else {
        return Some(cap);
    };

    let remaining = (end - now).to_std().ok()?;
    (!remaining.is_zero()).then_some(remaining.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet::tests::sample_record;
    use crate::notify::LogNotifier;
    use rust_decimal_macros::dec;
    use wager_common::MemoryBackend;

    struct Fixed(Side);

    impl WinnerPicker for Fixed {
        fn pick(&self) -> Side {
            self.0
        }
    }

    fn engine(winner: Side) -> Arc<BetEngine> {
        Arc::new(
            BetEngine::new(Arc::new(MemoryBackend::new()), Arc::new(LogNotifier::new()))
                .with_picker(Arc::new(Fixed(winner))),
        )
    }

    fn draft_from(record: &BetRecord) -> BetDraft {
        BetDraft {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            reward_description: record.reward_description.clone(),
            currency_reward: record.currency_reward,
            resolution_time: record.resolution_time,
            penalty_hours: record.penalty_hours,
            host_name: record.host_name.clone(),
            host_avatar_url: record.host_avatar_url.clone(),
            ping_role_id: None,
        }
    }

    #[test]
    fn test_remaining_penalty_anchored_at_resolution_time() {
        let mut record = sample_record();
        let now = Utc::now();
        record.resolution_time = (now - Duration::minutes(30)).fixed_offset();
        record.penalty_hours = dec!(2);

        let remaining = remaining_penalty(&record, now).unwrap();
        assert_eq!(remaining, StdDuration::from_secs(90 * 60));
    }

    #[test]
    fn test_remaining_penalty_elapsed() {
        let mut record = sample_record();
        let now = Utc::now();
        record.resolution_time = (now - Duration::hours(3)).fixed_offset();
        record.penalty_hours = dec!(2);
        assert!(remaining_penalty(&record, now).is_none());

        record.penalty_hours = Decimal::ZERO;
        record.resolution_time = now.fixed_offset();
        assert!(remaining_penalty(&record, now).is_none());
    }

    #[test]
    fn test_remaining_penalty_fractional_hours() {
        let mut record = sample_record();
        let now = Utc::now();
        record.resolution_time = now.fixed_offset();
        record.penalty_hours = dec!(0.5);
        assert_eq!(
            remaining_penalty(&record, now).unwrap(),
            StdDuration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_remaining_penalty_capped() {
        let mut record = sample_record();
        let now = Utc::now();
        let cap = StdDuration::from_secs(u64::from(MAX_PENALTY_HOURS) * 3600);
        record.resolution_time = now.fixed_offset();

        record.penalty_hours = dec!(10000000000);
        assert_eq!(remaining_penalty(&record, now), Some(cap));

        record.penalty_hours = Decimal::MAX;
        assert_eq!(remaining_penalty(&record, now), Some(cap));
    }

    #[test]
    fn test_remaining_penalty_end_out_of_range() {
        let mut record = sample_record();
        let cap = StdDuration::from_secs(u64::from(MAX_PENALTY_HOURS) * 3600);
        record.resolution_time = DateTime::<Utc>::MAX_UTC.fixed_offset();
        record.penalty_hours = dec!(2);
        assert_eq!(remaining_penalty(&record, Utc::now()), Some(cap));
    }

    #[tokio::test]
    async fn test_create_rejects_overlong_penalty() {
        let engine = engine(Side::SideA);
        let mut draft = draft_from(&sample_record());
        draft.penalty_hours = dec!(10000000000);

        let result = engine.create_bet(&ChannelRef::new("g1", "c1"), draft).await;
        assert!(matches!(result, Err(BetError::Invalid(_))));
        assert_eq!(engine.timers().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_stored_overlong_penalty_runs_side_effects() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = Arc::new(
            BetEngine::new(backend.clone(), Arc::new(LogNotifier::new()))
                .with_picker(Arc::new(Fixed(Side::SideB))),
        );
        let mut record = sample_record();
        record.penalty_hours = dec!(10000000000);
        record.participants.insert("u1".to_string(), Side::SideA);
        record.participants.insert("u2".to_string(), Side::SideB);
        Collection::<BetRecord>::new(backend, BETS_NAMESPACE)
            .set(&record.id, &record)
            .await
            .unwrap();

        let outcome = engine.resolve_bet(&record.id).await.unwrap();
        let ResolveOutcome::Resolved(report) = outcome else {
            panic!("expected resolution, got {:?}", outcome);
        };
        assert_eq!(report.losers, vec!["u1".to_string()]);
        assert_eq!(report.penalties_applied, 1);
        assert_eq!(report.penalties_skipped, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_penalty() {
        let engine = engine(Side::SideA);
        let mut draft = draft_from(&sample_record());
        draft.penalty_hours = dec!(-1);

        let result = engine.create_bet(&ChannelRef::new("g1", "c1"), draft).await;
        assert!(matches!(result, Err(BetError::Invalid(_))));
        assert_eq!(engine.timers().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_create_persists_and_arms() {
        let engine = engine(Side::SideA);
        let channel = ChannelRef::new("g1", "c1");
        let record = engine
            .create_bet(&channel, draft_from(&sample_record()))
            .await
            .unwrap();

        assert_eq!(record.message.channel, channel);
        assert!(record.participants.is_empty());
        assert_eq!(engine.get_bet(&record.id).await.unwrap(), Some(record.clone()));
        assert!(engine.timers().is_armed(&record.id));
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_toggle_join_switch_withdraw() {
        let engine = engine(Side::SideA);
        let record = engine
            .create_bet(&ChannelRef::new("g1", "c1"), draft_from(&sample_record()))
            .await
            .unwrap();

        let joined = engine
            .toggle_participation(&record.id, "u1", Side::SideA)
            .await
            .unwrap();
        assert_eq!(joined, ToggleOutcome::Joined(Side::SideA));

        let switched = engine
            .toggle_participation(&record.id, "u1", Side::SideB)
            .await
            .unwrap();
        assert_eq!(switched, ToggleOutcome::Joined(Side::SideB));
        let stored = engine.get_bet(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.participants.get("u1"), Some(&Side::SideB));

        let withdrawn = engine
            .toggle_participation(&record.id, "u1", Side::SideB)
            .await
            .unwrap();
        assert_eq!(withdrawn, ToggleOutcome::Withdrawn);
        let stored = engine.get_bet(&record.id).await.unwrap().unwrap();
        assert!(stored.participants.is_empty());
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_toggle_unknown_bet_is_expired() {
        let engine = engine(Side::SideA);
        let outcome = engine
            .toggle_participation("missing", "u1", Side::SideA)
            .await
            .unwrap();
        assert_eq!(outcome, ToggleOutcome::Expired);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let engine = engine(Side::SideB);
        let record = engine
            .create_bet(&ChannelRef::new("g1", "c1"), draft_from(&sample_record()))
            .await
            .unwrap();
        engine
            .toggle_participation(&record.id, "u1", Side::SideA)
            .await
            .unwrap();

        let first = engine.resolve_bet(&record.id).await.unwrap();
        let ResolveOutcome::Resolved(report) = first else {
            panic!("expected resolution, got {:?}", first);
        };
        assert_eq!(report.winning_side, Some(Side::SideB));
        assert_eq!(report.losers, vec!["u1".to_string()]);
        assert!(report.winners.is_empty());

        let second = engine.resolve_bet(&record.id).await.unwrap();
        assert_eq!(second, ResolveOutcome::AlreadyResolved(Side::SideB));
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_resolve_unknown_bet() {
        let engine = engine(Side::SideA);
        assert_eq!(
            engine.resolve_bet("missing").await.unwrap(),
            ResolveOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_refresh_skips_unchanged() {
        let engine = engine(Side::SideA);
        let record = engine
            .create_bet(&ChannelRef::new("g1", "c1"), draft_from(&sample_record()))
            .await
            .unwrap();

        assert_eq!(
            engine.refresh_display(&record.id, false).await.unwrap(),
            RefreshOutcome::Unchanged
        );
        assert_eq!(
            engine.refresh_display(&record.id, true).await.unwrap(),
            RefreshOutcome::Edited
        );
        assert_eq!(
            engine.refresh_display("missing", false).await.unwrap(),
            RefreshOutcome::BetMissing
        );
        engine.shutdown();
    }

    #[test]
    fn test_coin_flip_lands_on_both_sides() {
        let coin = CoinFlip;
        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..200 {
            match coin.pick() {
                Side::SideA => seen_a = true,
                Side::SideB => seen_b = true,
            }
        }
        assert!(seen_a && seen_b);
    }
}
