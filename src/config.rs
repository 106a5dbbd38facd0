//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bot tokens) are referenced by env-var name in the
//! config and resolved at startup via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::BotError;

/// Longest supported look-ahead window (one week).
pub const MAX_WINDOW_HOURS: i64 = 168;

/// Upper bound for the request and notification pacing intervals.
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub odds: OddsConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
    /// Run one cycle immediately at startup.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// UTC hours of the day at which a cycle is triggered.
    #[serde(default = "default_schedule_hours")]
    pub schedule_hours: Vec<u32>,
    /// How many ranked opportunities are persisted and announced per cycle.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Minimum gap between two notifier sends.
    #[serde(default = "default_notify_interval_ms")]
    pub notify_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsConfig {
    pub api_key_env: String,
    #[serde(default = "default_odds_base_url")]
    pub base_url: String,
    pub leagues: Vec<String>,
    #[serde(default = "default_regions")]
    pub regions: String,
    #[serde(default = "default_markets")]
    pub markets: String,
    /// Minimum gap between two provider requests.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    /// Only games kicking off within this many hours are kept.
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_min_odds")]
    pub min_odds: f64,
    #[serde(default = "default_max_odds")]
    pub max_odds: f64,
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Also evaluate the Over/Under 2.5 totals market.
    #[serde(default)]
    pub include_totals: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_odds: default_min_odds(),
            max_odds: default_max_odds(),
            min_edge: default_min_edge(),
            min_confidence: default_min_confidence(),
            include_totals: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token_env: Option<String>,
    pub chat_id_env: Option<String>,
    /// Adds a "Dashboard" link button to opportunity messages.
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// e.g. `sqlite://valuebet.db`. In-memory store when absent.
    pub database_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_schedule_hours() -> Vec<u32> {
    vec![6, 18]
}
fn default_top_n() -> usize {
    3
}
fn default_notify_interval_ms() -> u64 {
    2_000
}
fn default_odds_base_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}
fn default_regions() -> String {
    "us,uk,eu".to_string()
}
fn default_markets() -> String {
    "h2h,totals".to_string()
}
fn default_request_interval_ms() -> u64 {
    500
}
fn default_window_hours() -> i64 {
    24
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_min_odds() -> f64 {
    1.5
}
fn default_max_odds() -> f64 {
    5.0
}
fn default_min_edge() -> f64 {
    0.05
}
fn default_min_confidence() -> f64 {
    0.70
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the scanner misbehave silently.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.odds.leagues.is_empty() {
            return Err(BotError::Config("odds.leagues must not be empty".into()));
        }
        if !(1..=MAX_WINDOW_HOURS).contains(&self.odds.window_hours) {
            return Err(BotError::Config(format!(
                "odds.window_hours must be between 1 and {MAX_WINDOW_HOURS}"
            )));
        }
        for (name, ms) in [
            ("odds.request_interval_ms", self.odds.request_interval_ms),
            ("bot.notify_interval_ms", self.bot.notify_interval_ms),
        ] {
            if ms > MAX_INTERVAL_MS {
                return Err(BotError::Config(format!(
                    "{name} must be at most {MAX_INTERVAL_MS}"
                )));
            }
        }
        let a = &self.analysis;
        if !a.min_odds.is_finite()
            || !a.max_odds.is_finite()
            || a.min_odds <= 1.0
            || a.min_odds > a.max_odds
        {
            return Err(BotError::Config(format!(
                "analysis odds range [{}, {}] is invalid",
                a.min_odds, a.max_odds
            )));
        }
        if !a.min_edge.is_finite() || a.min_edge < 0.0 {
            return Err(BotError::Config(format!(
                "analysis.min_edge {} must be a non-negative number",
                a.min_edge
            )));
        }
        if !(0.0..=1.0).contains(&a.min_confidence) {
            return Err(BotError::Config(format!(
                "analysis.min_confidence {} must be within [0, 1]",
                a.min_confidence
            )));
        }
        if self.bot.top_n == 0 {
            return Err(BotError::Config("bot.top_n must be at least 1".into()));
        }
        if self.bot.schedule_hours.is_empty() {
            return Err(BotError::Config("bot.schedule_hours must not be empty".into()));
        }
        if let Some(h) = self.bot.schedule_hours.iter().find(|h| **h > 23) {
            return Err(BotError::Config(format!("schedule hour {h} is out of range")));
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.odds.request_interval_ms)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.bot.notify_interval_ms)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an env-var reference into a secret, if it is set and non-empty.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        env_name
            .and_then(|name| Self::resolve_env(name).ok())
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }
}
