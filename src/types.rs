//! Shared types for the value-bet scanner.
//!
//! These types form the data model used across all modules: games as
//! fetched from the odds provider, opportunities emitted by the detector,
//! and the records owned by the persistence layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Games (odds provider side)
// ---------------------------------------------------------------------------

/// Market key for the three-way head-to-head market.
pub const MARKET_H2H: &str = "h2h";
/// Market key for over/under totals.
pub const MARKET_TOTALS: &str = "totals";

/// An upcoming match with all bookmaker quotes, tagged with its league.
///
/// Lives for a single analysis cycle only; never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    /// Provider league key, e.g. `soccer_epl`.
    pub league: String,
    pub commence_time: DateTime<Utc>,
    pub quotes: Vec<BookmakerQuote>,
}

impl Game {
    /// Quotes for a single market key.
    pub fn quotes_for<'a>(&'a self, market: &'a str) -> impl Iterator<Item = &'a BookmakerQuote> {
        self.quotes.iter().filter(move |q| q.market == market)
    }

    /// Whether kick-off lies strictly inside `(from, until)`.
    pub fn starts_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.commence_time > from && self.commence_time < until
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} @ {}",
            self.league,
            self.home_team,
            self.away_team,
            self.commence_time.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// One bookmaker's prices for one market of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerQuote {
    pub bookmaker: String,
    pub market: String,
    pub outcomes: Vec<OutcomePrice>,
}

/// A single priced outcome. `point` is the line for totals markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrice {
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// Settlement state of an opportunity. Only ever changed from outside the
/// analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Void,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Pending => "pending",
            OpportunityStatus::Won => "won",
            OpportunityStatus::Lost => "lost",
            OpportunityStatus::Void => "void",
        }
    }
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OpportunityStatus {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OpportunityStatus::Pending),
            "won" => Ok(OpportunityStatus::Won),
            "lost" => Ok(OpportunityStatus::Lost),
            "void" => Ok(OpportunityStatus::Void),
            other => Err(BotError::InvalidStatus(other.to_string())),
        }
    }
}

/// A value-bet candidate produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub game_id: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    /// Human-readable market label, e.g. `1X2` or `Over/Under`.
    pub market: String,
    pub selection: String,
    pub odds: f64,
    /// Edge over the implied probability, as a fraction.
    pub value: f64,
    pub confidence: f64,
    pub implied_probability: f64,
    pub calculated_probability: f64,
    pub bookmaker: String,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub status: OpportunityStatus,
}

impl Opportunity {
    /// Ranking score used to pick the best opportunities of a cycle.
    pub fn score(&self) -> f64 {
        self.value * self.confidence
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} | {} {} @ {:.2} ({}) | value {:.1}% conf {:.0}%",
            self.home_team,
            self.away_team,
            self.market,
            self.selection,
            self.odds,
            self.bookmaker,
            self.value * 100.0,
            self.confidence * 100.0,
        )
    }
}

/// A persisted opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub opportunity: Opportunity,
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// One row per calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub games_analyzed: u32,
    pub opportunities_found: u32,
    /// Sum of edges of every candidate found.
    pub total_value: f64,
    /// Percentage of settled opportunities that won. `None` until something
    /// from that day has been settled.
    pub success_rate: Option<f64>,
}

impl DailyAnalytics {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            games_analyzed: 0,
            opportunities_found: 0,
            total_value: 0.0,
            success_rate: None,
        }
    }

    /// Overwrite the fields present in `update`.
    pub fn apply(&mut self, update: &AnalyticsUpdate) {
        if let Some(v) = update.games_analyzed {
            self.games_analyzed = v;
        }
        if let Some(v) = update.opportunities_found {
            self.opportunities_found = v;
        }
        if let Some(v) = update.total_value {
            self.total_value = v;
        }
        if let Some(v) = update.success_rate {
            self.success_rate = Some(v);
        }
    }
}

/// Partial write for [`DailyAnalytics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsUpdate {
    pub games_analyzed: Option<u32>,
    pub opportunities_found: Option<u32>,
    pub total_value: Option<f64>,
    pub success_rate: Option<f64>,
}

/// Won/lost counts for opportunities created on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementTally {
    pub won: u32,
    pub lost: u32,
}

impl SettlementTally {
    /// Win percentage over decided bets; voids and pendings are ignored.
    pub fn success_rate(&self) -> Option<f64> {
        let decided = self.won + self.lost;
        if decided == 0 {
            None
        } else {
            Some(self.won as f64 / decided as f64 * 100.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Bot status
// ---------------------------------------------------------------------------

/// Phase of the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    Online,
    Offline,
    Analyzing,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Online => "online",
            BotState::Offline => "offline",
            BotState::Analyzing => "analyzing",
        }
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BotState {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(BotState::Online),
            "offline" => Ok(BotState::Offline),
            "analyzing" => Ok(BotState::Analyzing),
            other => Err(BotError::InvalidStatus(other.to_string())),
        }
    }
}

/// Singleton status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub state: BotState,
    pub last_analysis: Option<DateTime<Utc>>,
    pub next_analysis: Option<DateTime<Utc>>,
    pub games_analyzed_today: u32,
    pub opportunities_found_today: u32,
    pub updated_at: DateTime<Utc>,
}

impl BotStatus {
    pub fn new(state: BotState) -> Self {
        Self {
            state,
            last_analysis: None,
            next_analysis: None,
            games_analyzed_today: 0,
            opportunities_found_today: 0,
            updated_at: Utc::now(),
        }
    }

    /// Merge a partial update and bump `updated_at`.
    pub fn apply(&mut self, update: &StatusUpdate) {
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(t) = update.last_analysis {
            self.last_analysis = Some(t);
        }
        if let Some(t) = update.next_analysis {
            self.next_analysis = Some(t);
        }
        if let Some(n) = update.games_analyzed_today {
            self.games_analyzed_today = n;
        }
        if let Some(n) = update.opportunities_found_today {
            self.opportunities_found_today = n;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial write for [`BotStatus`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub state: Option<BotState>,
    pub last_analysis: Option<DateTime<Utc>>,
    pub next_analysis: Option<DateTime<Utc>>,
    pub games_analyzed_today: Option<u32>,
    pub opportunities_found_today: Option<u32>,
}

impl StatusUpdate {
    pub fn state(state: BotState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Analysis,
    Opportunity,
    Success,
    Error,
    Info,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Analysis => "analysis",
            LogKind::Opportunity => "opportunity",
            LogKind::Success => "success",
            LogKind::Error => "error",
            LogKind::Info => "info",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(LogKind::Analysis),
            "opportunity" => Ok(LogKind::Opportunity),
            "success" => Ok(LogKind::Success),
            "error" => Ok(LogKind::Error),
            "info" => Ok(LogKind::Info),
            other => Err(BotError::Storage(format!("unknown log kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Odds provider error ({league}): {message}")]
    Provider { league: String, message: String },

    #[error("Malformed game {id}: {reason}")]
    InvalidGame { id: String, reason: String },

    #[error("Notifier error ({notifier}): {message}")]
    Notify { notifier: String, message: String },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
