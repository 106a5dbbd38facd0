//! valuebet: pre-match value-bet scanner
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the odds provider, store and notifier, and runs the analysis cycle on
//! start and at fixed times of day until Ctrl+C.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use valuebet::config::{self, AppConfig};
use valuebet::dashboard::{self, DashboardState};
use valuebet::engine::{Analyzer, CycleOutcome};
use valuebet::notify::telegram::TelegramNotifier;
use valuebet::notify::{LogNotifier, Notifier};
use valuebet::odds::the_odds_api::TheOddsApiClient;
use valuebet::storage;
use valuebet::types::{BotState, StatusUpdate};

const BANNER: &str = r#"
            _            _          _
 __ ____ _ | |_  _  ___ | |__  ___ | |_
 \ V / _` || | || |/ -_)| '_ \/ -_)|  _|
  \_/\__,_||_|\_,_|\___||_.__/\___| \__|

  Pre-match value-bet scanner
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("VALUEBET_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        leagues = cfg.odds.leagues.len(),
        schedule_hours = ?cfg.bot.schedule_hours,
        top_n = cfg.bot.top_n,
        "valuebet starting up"
    );

    // -- Initialise components -------------------------------------------

    let store = storage::open_store(&cfg.storage).await?;

    let api_key = AppConfig::resolve_secret(Some(&cfg.odds.api_key_env))
        .with_context(|| format!("Odds API key missing: set {}", cfg.odds.api_key_env))?;
    let source = Arc::new(TheOddsApiClient::new(&cfg.odds, api_key)?);

    let notifier = build_notifier(&cfg)?;

    let analyzer = Arc::new(Analyzer::from_config(&cfg, source, store.clone(), notifier));

    store
        .set_status(StatusUpdate {
            state: Some(BotState::Online),
            next_analysis: Some(analyzer.schedule().next_after(Utc::now())),
            ..Default::default()
        })
        .await?;

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(analyzer.clone()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    // -- Main loop -------------------------------------------------------

    if cfg.bot.run_on_start {
        log_outcome(&analyzer.run_scheduled().await);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering schedule loop. Press Ctrl+C to stop.");

    loop {
        let now = Utc::now();
        let wait = analyzer.schedule().until_next(now);
        info!(
            next_run = %analyzer.schedule().next_after(now),
            wait_secs = wait.as_secs(),
            "Waiting for next scheduled analysis"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                log_outcome(&analyzer.run_scheduled().await);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    if let Err(e) = store.set_status(StatusUpdate::state(BotState::Offline)).await {
        warn!(error = %e, "Failed to record shutdown status");
    }
    info!("valuebet shut down cleanly.");

    Ok(())
}

/// Telegram when a token and chat are configured, log output otherwise.
fn build_notifier(cfg: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let token = AppConfig::resolve_secret(cfg.telegram.bot_token_env.as_deref());
    let chat_id = cfg
        .telegram
        .chat_id_env
        .as_deref()
        .and_then(|name| AppConfig::resolve_env(name).ok())
        .filter(|id| !id.trim().is_empty());

    match (token, chat_id) {
        (Some(token), Some(chat_id)) => {
            info!("Telegram notifications enabled");
            Ok(Arc::new(TelegramNotifier::new(token, chat_id)?))
        }
        _ => {
            warn!("Telegram not configured; notifications go to the log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Log a one-line cycle summary.
fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed {
            games,
            found,
            selected,
            failed_leagues,
        } => info!(games, found, selected, failed_leagues, "Cycle complete"),
        CycleOutcome::NoGames { failed_leagues } => {
            info!(failed_leagues, "Cycle complete, no games in window")
        }
        CycleOutcome::Skipped => info!("Cycle skipped, one already running"),
        CycleOutcome::Paused => info!("Cycle skipped, bot paused"),
        CycleOutcome::Failed { error } => warn!(error = %error, "Cycle failed, bot offline"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("valuebet=info"));

    let json_logging = std::env::var("VALUEBET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
