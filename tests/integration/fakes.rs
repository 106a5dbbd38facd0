//! In-memory fakes for integration testing.
//!
//! `FakeOddsSource` serves fixed games per league and can be told to fail
//! specific leagues. `RecordingNotifier` keeps every message it was asked
//! to send and can be switched into a failing mode.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use valuebet::config::AppConfig;
use valuebet::notify::{Message, Notifier};
use valuebet::odds::OddsSource;
use valuebet::types::{BookmakerQuote, Game, OutcomePrice, MARKET_H2H};

/// Configuration with zero pacing so tests run instantly.
pub fn test_config(leagues: &[&str]) -> AppConfig {
    let leagues = leagues
        .iter()
        .map(|l| format!("\"{l}\""))
        .collect::<Vec<_>>()
        .join(", ");
    AppConfig::from_toml(&format!(
        r#"
        [bot]
        name = "valuebet-it"
        run_on_start = false
        top_n = 3
        notify_interval_ms = 0

        [odds]
        api_key_env = "VALUEBET_IT_UNUSED"
        leagues = [{leagues}]
        request_interval_ms = 0
        "#
    ))
    .unwrap()
}

/// A head-to-head game priced by one bookmaker.
pub fn h2h_game(
    id: &str,
    home: &str,
    away: &str,
    kickoff: DateTime<Utc>,
    prices: (f64, f64, f64),
) -> Game {
    let (home_price, away_price, draw_price) = prices;
    Game {
        id: id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        league: String::new(),
        commence_time: kickoff,
        quotes: vec![BookmakerQuote {
            bookmaker: "Pinnacle".into(),
            market: MARKET_H2H.into(),
            outcomes: vec![
                OutcomePrice { name: home.into(), price: home_price, point: None },
                OutcomePrice { name: away.into(), price: away_price, point: None },
                OutcomePrice { name: "Draw".into(), price: draw_price, point: None },
            ],
        }],
    }
}

/// Home @ 2.00 rejected, away @ 3.00 accepted.
pub fn ab_game(id: &str) -> Game {
    h2h_game(id, "A", "B", Utc::now() + Duration::hours(6), (2.0, 3.0, 3.4))
}

#[derive(Default)]
pub struct FakeOddsSource {
    games: HashMap<String, Vec<Game>>,
    failing: HashSet<String>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeOddsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_games(mut self, league: &str, games: Vec<Game>) -> Self {
        self.games.insert(league.to_string(), games);
        self
    }

    pub fn failing(mut self, league: &str) -> Self {
        self.failing.insert(league.to_string());
        self
    }

    /// Handle on the list of leagues requested so far, in order.
    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl OddsSource for FakeOddsSource {
    async fn fetch_league(&self, league: &str) -> Result<Vec<Game>> {
        self.requests.lock().unwrap().push(league.to_string());
        if self.failing.contains(league) {
            return Err(anyhow!("HTTP 503 for {league}"));
        }
        Ok(self.games.get(league).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
    force_error: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `msg`.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        if let Some(err) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(err));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
