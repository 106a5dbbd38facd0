//! Odds collection.
//!
//! Defines the `OddsSource` trait (one provider read per league) and the
//! `OddsFetcher` that walks every configured league sequentially, isolates
//! per-league failures and keeps only games kicking off inside the
//! look-ahead window.

pub mod the_odds_api;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::pacing::Pacer;
use crate::types::Game;

/// Abstraction over an odds-data provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fetch all upcoming games of one league with their bookmaker quotes.
    async fn fetch_league(&self, league: &str) -> Result<Vec<Game>>;

    /// Cheap reachability check used by the status snapshot.
    async fn ping(&self) -> Result<()>;
}

/// A league whose read failed during a fetch pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueFailure {
    pub league: String,
    pub error: String,
}

/// Result of one pass over all leagues.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub games: Vec<Game>,
    pub failures: Vec<LeagueFailure>,
}

/// Sequential multi-league fetcher.
pub struct OddsFetcher {
    source: Arc<dyn OddsSource>,
    pacer: Box<dyn Pacer>,
    window: Duration,
}

impl OddsFetcher {
    /// `window` is the look-ahead horizon; games must start within it.
    pub fn new(source: Arc<dyn OddsSource>, pacer: Box<dyn Pacer>, window: Duration) -> Self {
        Self {
            source,
            pacer,
            window,
        }
    }

    pub fn source(&self) -> &Arc<dyn OddsSource> {
        &self.source
    }

    /// Fetch every league one after the other.
    ///
    /// A failing league is recorded in `failures` and contributes no games;
    /// it never aborts the pass. Nothing is retried.
    pub async fn fetch_all(&self, leagues: &[String], now: DateTime<Utc>) -> FetchReport {
        let mut report = FetchReport::default();
        let until = now
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        for league in leagues {
            self.pacer.ready().await;
            debug!(league = %league, "Fetching odds");

            match self.source.fetch_league(league).await {
                Ok(games) => {
                    let fetched = games.len();
                    let kept: Vec<Game> = games
                        .into_iter()
                        .filter(|g| g.starts_between(now, until))
                        .map(|mut g| {
                            g.league = league.clone();
                            g
                        })
                        .collect();
                    info!(
                        league = %league,
                        fetched,
                        in_window = kept.len(),
                        "League fetched"
                    );
                    report.games.extend(kept);
                }
                Err(e) => {
                    warn!(league = %league, error = %format!("{e:#}"), "League fetch failed, skipping");
                    report.failures.push(LeagueFailure {
                        league: league.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            leagues = leagues.len(),
            failed = report.failures.len(),
            games = report.games.len(),
            "Odds fetch complete"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
