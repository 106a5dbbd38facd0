//! The analysis cycle.
//!
//! One cycle: mark the bot as analysing, fetch every league, detect value,
//! rank, persist and announce the best picks, record daily analytics and
//! go back online. Any persistence error aborts the cycle and takes the bot
//! offline until the next trigger. Notifier failures are logged and the
//! cycle carries on.
//!
//! An operator can pause the bot. Scheduled triggers are then ignored until
//! it is resumed; manual triggers still run.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::pacing::{MinInterval, Pacer};
use super::schedule::DailySchedule;
use crate::config::AppConfig;
use crate::notify::{format, Message, Notifier};
use crate::odds::{OddsFetcher, OddsSource};
use crate::storage::Store;
use crate::strategy::value::{ValueConfig, ValueDetector};
use crate::strategy::{select_top, total_value};
use crate::types::{AnalyticsUpdate, BotState, LogKind, StatusUpdate};

/// How a trigger ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle was already running; nothing was touched.
    Skipped,
    /// Scheduled trigger while the bot is paused.
    Paused,
    /// No game inside the look-ahead window.
    NoGames { failed_leagues: usize },
    Completed {
        games: usize,
        found: usize,
        selected: usize,
        failed_leagues: usize,
    },
    Failed { error: String },
}

/// Per-cycle knobs that are not owned by a collaborator.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub leagues: Vec<String>,
    pub top_n: usize,
    pub window_hours: i64,
    pub dashboard_url: Option<String>,
}

impl From<&AppConfig> for CycleSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            leagues: cfg.odds.leagues.clone(),
            top_n: cfg.bot.top_n,
            window_hours: cfg.odds.window_hours,
            dashboard_url: cfg.telegram.dashboard_url.clone(),
        }
    }
}

/// Clears the in-progress flag when a cycle ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Analyzer {
    fetcher: OddsFetcher,
    detector: ValueDetector,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    notify_pacer: Box<dyn Pacer>,
    schedule: DailySchedule,
    settings: CycleSettings,
    running: AtomicBool,
    paused: AtomicBool,
}

impl Analyzer {
    pub fn new(
        fetcher: OddsFetcher,
        detector: ValueDetector,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        notify_pacer: Box<dyn Pacer>,
        schedule: DailySchedule,
        settings: CycleSettings,
    ) -> Self {
        Self {
            fetcher,
            detector,
            store,
            notifier,
            notify_pacer,
            schedule,
            settings,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    /// Wire every piece from configuration around the given collaborators.
    pub fn from_config(
        cfg: &AppConfig,
        source: Arc<dyn OddsSource>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fetcher = OddsFetcher::new(
            source,
            Box::new(MinInterval::new(cfg.request_interval())),
            chrono::Duration::hours(cfg.odds.window_hours),
        );
        Self::new(
            fetcher,
            ValueDetector::new(ValueConfig::from(&cfg.analysis)),
            store,
            notifier,
            Box::new(MinInterval::new(cfg.notify_interval())),
            DailySchedule::new(&cfg.bot.schedule_hours),
            CycleSettings::from(cfg),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Stop honouring scheduled triggers and report the bot offline.
    pub async fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::Release);
        info!("Bot paused by operator");
        self.store.set_status(StatusUpdate::state(BotState::Offline)).await?;
        self.store
            .append_log(
                LogKind::Info,
                "Bot stopped manually",
                Some(json!({ "action": "stop_bot" })),
            )
            .await
    }

    /// Resume scheduled triggers and report the bot online.
    pub async fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::Release);
        info!("Bot resumed by operator");
        self.store
            .set_status(StatusUpdate {
                state: Some(BotState::Online),
                next_analysis: Some(self.schedule.next_after(Utc::now())),
                ..Default::default()
            })
            .await?;
        self.store
            .append_log(
                LogKind::Info,
                "Bot started manually",
                Some(json!({ "action": "start_bot" })),
            )
            .await
    }

    /// Send a test message through the notifier and record the result.
    ///
    /// Unlike cycle notifications, a delivery failure is returned.
    pub async fn send_test_notification(&self) -> Result<()> {
        self.notify_pacer.ready().await;
        match self.notifier.send(&format::test_notification(Utc::now())).await {
            Ok(()) => {
                info!("Test notification sent");
                self.store
                    .append_log(
                        LogKind::Success,
                        "Test notification sent",
                        Some(json!({ "action": "test_notification" })),
                    )
                    .await
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(error = %reason, "Test notification failed");
                self.store
                    .append_log(
                        LogKind::Error,
                        &format!("Test notification failed: {reason}"),
                        Some(json!({ "action": "test_notification" })),
                    )
                    .await?;
                Err(e)
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn source(&self) -> &Arc<dyn OddsSource> {
        self.fetcher.source()
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    /// Entry point for timer triggers: a paused bot does nothing.
    pub async fn run_scheduled(&self) -> CycleOutcome {
        if self.is_paused() {
            info!("Bot paused, skipping scheduled analysis");
            return CycleOutcome::Paused;
        }
        self.run_cycle().await
    }

    /// Run one cycle unless one is already in progress.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("Analysis already running, skipping trigger");
            return CycleOutcome::Skipped;
        };

        match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = format!("{e:#}");
                self.take_offline(&reason).await;
                CycleOutcome::Failed { error: reason }
            }
        }
    }

    async fn execute(&self) -> Result<CycleOutcome> {
        let started = Utc::now();
        info!(leagues = self.settings.leagues.len(), "Starting analysis cycle");

        self.store
            .set_status(StatusUpdate {
                state: Some(BotState::Analyzing),
                last_analysis: Some(started),
                ..Default::default()
            })
            .await?;
        self.store
            .append_log(
                LogKind::Analysis,
                "Starting analysis cycle",
                Some(json!({ "leagues": self.settings.leagues })),
            )
            .await?;
        self.notify(format::start()).await;

        // -- Fetch ---------------------------------------------------------

        let report = self.fetcher.fetch_all(&self.settings.leagues, started).await;
        for failure in &report.failures {
            self.store
                .append_log(
                    LogKind::Error,
                    &format!("Failed to fetch odds for {}", failure.league),
                    Some(json!({ "league": failure.league, "error": failure.error })),
                )
                .await?;
        }
        let failed_leagues = report.failures.len();
        let games = report.games;
        let next = self.schedule.next_after(Utc::now());

        if games.is_empty() {
            info!(failed_leagues, "No games in window");
            self.notify(format::no_games(self.settings.window_hours, next)).await;
            self.store
                .set_status(StatusUpdate {
                    state: Some(self.idle_state()),
                    next_analysis: Some(next),
                    ..Default::default()
                })
                .await?;
            self.store
                .append_log(LogKind::Info, "No games found in the look-ahead window", None)
                .await?;
            return Ok(CycleOutcome::NoGames { failed_leagues });
        }

        // -- Detect and rank -----------------------------------------------

        let candidates = self.detector.detect_all(&games);
        let found = candidates.len();
        let cycle_value = total_value(&candidates);
        let picks = select_top(candidates, self.settings.top_n);
        info!(
            games = games.len(),
            found,
            selected = picks.len(),
            "Detection complete"
        );

        self.notify(format::summary(games.len(), found, picks.len(), next))
            .await;

        // -- Persist and announce --------------------------------------------

        for pick in &picks {
            let id = self.store.create_opportunity(pick).await?;
            self.notify(format::opportunity(pick, self.settings.dashboard_url.as_deref()))
                .await;
            self.store
                .append_log(
                    LogKind::Opportunity,
                    &format!("New opportunity: {} vs {}", pick.home_team, pick.away_team),
                    Some(json!({
                        "id": id,
                        "market": pick.market,
                        "selection": pick.selection,
                        "odds": pick.odds,
                        "value": pick.value,
                        "confidence": pick.confidence,
                    })),
                )
                .await?;
            info!(id = %id, opportunity = %pick, "Opportunity published");
        }

        // -- Analytics and status --------------------------------------------

        let today = started.date_naive();
        let tally = self.store.settlement_tally(today).await?;
        self.store
            .upsert_daily_analytics(
                today,
                AnalyticsUpdate {
                    games_analyzed: Some(count(games.len())),
                    opportunities_found: Some(count(found)),
                    total_value: Some(cycle_value),
                    success_rate: tally.success_rate(),
                },
            )
            .await?;

        self.store
            .set_status(StatusUpdate {
                state: Some(self.idle_state()),
                next_analysis: Some(next),
                games_analyzed_today: Some(count(games.len())),
                opportunities_found_today: Some(count(found)),
                ..Default::default()
            })
            .await?;
        self.store
            .append_log(
                LogKind::Success,
                &format!(
                    "Analysis complete: {} games, {} opportunities",
                    games.len(),
                    found
                ),
                None,
            )
            .await?;

        info!(next_analysis = %next, "Analysis cycle complete");
        Ok(CycleOutcome::Completed {
            games: games.len(),
            found,
            selected: picks.len(),
            failed_leagues,
        })
    }

    /// State reported between cycles.
    fn idle_state(&self) -> BotState {
        if self.is_paused() {
            BotState::Offline
        } else {
            BotState::Online
        }
    }

    /// Send through the pacer; failures never fail the cycle.
    async fn notify(&self, message: Message) {
        self.notify_pacer.ready().await;
        if let Err(e) = self.notifier.send(&message).await {
            let reason = format!("{e:#}");
            warn!(error = %reason, "Notification failed");
            if let Err(log_err) = self
                .store
                .append_log(LogKind::Error, &format!("Notification failed: {reason}"), None)
                .await
            {
                warn!(error = %log_err, "Could not record notification failure");
            }
        }
    }

    /// Best effort: every step is attempted even if an earlier one fails.
    async fn take_offline(&self, reason: &str) {
        error!(error = %reason, "Analysis cycle failed");

        if let Err(e) = self.store.set_status(StatusUpdate::state(BotState::Offline)).await {
            error!(error = %e, "Could not set status offline");
        }
        if let Err(e) = self
            .store
            .append_log(LogKind::Error, &format!("Analysis failed: {reason}"), None)
            .await
        {
            error!(error = %e, "Could not record cycle failure");
        }
        self.notify(format::error(reason, Utc::now())).await;
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
