//! Community bot running timed team bets and a facts knowledge base.
//!
//! A bet is announced with two join buttons, collects participants until its
//! resolution time, then a fair coin decides the winning side. Losers are
//! timed out and winners may be credited currency.
//!
//! ## Architecture
//!
//! - **Store is the source of truth**: timers are rebuilt from it on start
//! - **Idempotent resolution**: a recorded winner is never picked again
//! - **Per-bet locks**: participant toggles never lose updates
//! - **Best-effort side effects**: one failed penalty or credit never blocks another
//!
//! ## Modules
//!
//! - `bet`: bet lifecycle engine, timers, rendering, drafts, daily schedule
//! - `notify`: chat platform side effects (Discord REST, dry-run logger)
//! - `reward`: currency credits (UnbelievaBoat)
//! - `guild`: per-guild settings
//! - `facts`: crowd-sourced facts with auto-reply
//! - `interaction`: button custom id routing
//! - `config`: configuration loading and validation

pub mod bet;
pub mod config;
pub mod facts;
pub mod guild;
pub mod interaction;
pub mod notify;
pub mod reward;

pub use bet::engine::{BetEngine, CoinFlip, RecoverySummary, RefreshOutcome, WinnerPicker};
pub use bet::schedule::{BetTemplate, DailyScheduler, GuildScheduleConfig};
pub use bet::timer::TimerRegistry;
pub use bet::{
    BetDraft, BetError, BetRecord, ResolutionReport, ResolveOutcome, ToggleOutcome,
};
pub use config::BotConfig;
pub use facts::{FactBook, FactEdit, FactEditor, FactError, FactRecord};
pub use guild::{GuildBetConfig, GuildSettings, RewardConfig};
pub use notify::{DiscordNotifier, EditOutcome, LogNotifier, Notifier, NotifyError};
pub use reward::{RewardError, RewardSink, UnbelievaBoatClient};
