//! wager-bot: timed team bets for Discord guilds.
//!
//! Usage:
//!   wager-bot [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>         Config file path (default: config/bot.toml)
//!   --log-level <LEVEL>         trace, debug, info, warn, error (overrides config)
//!   --dry-run                   Log platform calls instead of performing them

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wager_bot::config::BotConfig;
use wager_bot::{
    BetEngine, DailyScheduler, DiscordNotifier, LogNotifier, Notifier, UnbelievaBoatClient,
};
use wager_common::FileBackend;

/// CLI arguments for wager-bot.
#[derive(Parser, Debug)]
#[command(name = "wager-bot")]
#[command(about = "Timed team bets for Discord guilds")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/bot.toml")]
    config: PathBuf,

    /// Log level (overrides config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Log platform calls instead of performing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let args = Args::parse();

    let config_missing = !args.config.exists();
    let mut config = if config_missing {
        BotConfig::default()
    } else {
        BotConfig::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    };
    config.apply_env_overrides();
    config.apply_cli_overrides(args.log_level, args.dry_run);

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    if config_missing {
        warn!("Config file not found at {:?}, using defaults", args.config);
    }
    info!("Starting wager-bot");
    info!("Dry run: {}", config.dry_run);
    info!("Store: {:?}", config.store.path);

    config.validate().context("Configuration validation failed")?;
    let timezone = config.bets.tz()?;

    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }
    }
    let backend = Arc::new(
        FileBackend::open(&config.store.path)
            .await
            .with_context(|| format!("Failed to open store {:?}", config.store.path))?,
    );

    let notifier: Arc<dyn Notifier> = match (&config.discord.token, config.dry_run) {
        (Some(token), false) => Arc::new(DiscordNotifier::new(
            token.clone(),
            config.discord.api_base.clone(),
        )),
        _ => {
            info!("Dry run: platform calls are logged only");
            Arc::new(LogNotifier::new())
        }
    };

    let mut engine = BetEngine::new(backend, notifier);
    if !config.dry_run {
        engine = engine.with_rewards(Arc::new(UnbelievaBoatClient::new(
            config.rewards.api_base.clone(),
        )));
    }
    let engine = Arc::new(engine);

    let summary = engine
        .recover_all_pending()
        .await
        .context("Failed to recover pending bets")?;
    info!(
        "Recovered {} pending bets ({} already resolved)",
        summary.armed, summary.resolved
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler =
            DailyScheduler::new(Arc::clone(&engine), timezone, config.scheduler.max_sleep);
        Some(tokio::spawn(scheduler.run(shutdown_tx.subscribe())))
    } else {
        info!("Daily scheduler disabled");
        None
    };

    if let Err(e) = wait_for_shutdown().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down...");

    let _ = shutdown_tx.send(());
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
    engine.shutdown();

    info!("wager-bot stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C on Windows).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
