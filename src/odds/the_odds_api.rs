//! The Odds API (v4) client.
//!
//! API docs: https://the-odds-api.com/liveapi/guides/v4/
//! Endpoint: `GET /v4/sports/{sport}/odds`
//! Auth: `apiKey` query parameter. Quota reported in the
//! `x-requests-remaining` / `x-requests-used` response headers.
//!
//! Responses are decoded entry by entry into explicit raw schemas and then
//! validated into [`Game`]; a malformed event is dropped without failing
//! the rest of the league.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use super::OddsSource;
use crate::config::OddsConfig;
use crate::types::{BookmakerQuote, BotError, Game, OutcomePrice};

// ---------------------------------------------------------------------------
// API response types (The Odds API JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    commence_time: Option<String>,
    #[serde(default)]
    home_team: Option<String>,
    #[serde(default)]
    away_team: Option<String>,
    #[serde(default)]
    bookmakers: Vec<RawBookmaker>,
}

#[derive(Debug, Deserialize)]
struct RawBookmaker {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct RawMarket {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    point: Option<f64>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawEvent {
    /// Validate into a [`Game`]. Outcomes without a usable decimal price
    /// (missing, non-finite or not above 1.0) are dropped, as are markets
    /// and bookmakers left with nothing.
    fn into_game(self, league: &str) -> Result<Game, BotError> {
        let id = non_empty(self.id).unwrap_or_else(|| "<missing>".to_string());
        let invalid = |reason: &str| BotError::InvalidGame {
            id: id.clone(),
            reason: reason.to_string(),
        };

        if id == "<missing>" {
            return Err(invalid("missing id"));
        }
        let home_team = non_empty(self.home_team).ok_or_else(|| invalid("missing home_team"))?;
        let away_team = non_empty(self.away_team).ok_or_else(|| invalid("missing away_team"))?;
        let commence_raw = self
            .commence_time
            .ok_or_else(|| invalid("missing commence_time"))?;
        let commence_time = DateTime::parse_from_rfc3339(&commence_raw)
            .map_err(|e| invalid(&format!("bad commence_time {commence_raw:?}: {e}")))?
            .with_timezone(&Utc);

        let mut quotes = Vec::new();
        for bm in self.bookmakers {
            let Some(bookmaker) = non_empty(bm.title).or_else(|| non_empty(bm.key)) else {
                continue;
            };
            for market in bm.markets {
                let Some(market_key) = non_empty(market.key) else {
                    continue;
                };
                let outcomes: Vec<OutcomePrice> = market
                    .outcomes
                    .into_iter()
                    .filter_map(|o| {
                        let name = non_empty(o.name)?;
                        let price = o.price.filter(|p| p.is_finite() && *p > 1.0)?;
                        Some(OutcomePrice {
                            name,
                            price,
                            point: o.point.filter(|p| p.is_finite()),
                        })
                    })
                    .collect();
                if outcomes.is_empty() {
                    continue;
                }
                quotes.push(BookmakerQuote {
                    bookmaker: bookmaker.clone(),
                    market: market_key,
                    outcomes,
                });
            }
        }

        Ok(Game {
            id,
            home_team,
            away_team,
            league: league.to_string(),
            commence_time,
            quotes,
        })
    }
}

/// Decode a provider response body into validated games.
///
/// Returns the accepted games and the number of rejected entries. Fails
/// only when the body is not a JSON array at all.
pub fn parse_events(body: &str, league: &str) -> Result<(Vec<Game>, usize)> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(body).context("Odds response is not a JSON array")?;

    let mut games = Vec::with_capacity(entries.len());
    let mut rejected = 0usize;

    for entry in entries {
        let parsed = serde_json::from_value::<RawEvent>(entry)
            .map_err(|e| BotError::InvalidGame {
                id: "<undecodable>".into(),
                reason: e.to_string(),
            })
            .and_then(|raw| raw.into_game(league));
        match parsed {
            Ok(game) => games.push(game),
            Err(e) => {
                rejected += 1;
                warn!(league, error = %e, "Rejecting malformed event");
            }
        }
    }

    Ok((games, rejected))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Remaining/used request counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaInfo {
    pub remaining: Option<u32>,
    pub used: Option<u32>,
}

/// The Odds API client.
pub struct TheOddsApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    regions: String,
    markets: String,
    quota: Mutex<QuotaInfo>,
}

impl TheOddsApiClient {
    pub fn new(config: &OddsConfig, api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("valuebet/0.1.0")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            regions: config.regions.clone(),
            markets: config.markets.clone(),
            quota: Mutex::new(QuotaInfo::default()),
        })
    }

    /// Last quota figures seen in a response.
    pub fn quota(&self) -> QuotaInfo {
        self.quota.lock().map(|q| *q).unwrap_or_default()
    }

    fn record_quota(&self, headers: &reqwest::header::HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u32>().ok())
        };
        let info = QuotaInfo {
            remaining: read("x-requests-remaining"),
            used: read("x-requests-used"),
        };
        if let Ok(mut q) = self.quota.lock() {
            *q = info;
        }
    }
}

#[async_trait]
impl OddsSource for TheOddsApiClient {
    async fn fetch_league(&self, league: &str) -> Result<Vec<Game>> {
        let url = format!("{}/sports/{}/odds", self.base_url, urlencoding::encode(league));

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.expose_secret().as_str()),
                ("regions", self.regions.as_str()),
                ("markets", self.markets.as_str()),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await
            // The query string carries the API key; keep it out of errors.
            .map_err(|e| e.without_url())
            .with_context(|| format!("Odds request failed for {league}"))?;

        self.record_quota(resp.headers());

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Provider {
                league: league.to_string(),
                message: format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
            }
            .into());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Failed to read odds body for {league}"))?;
        let (games, rejected) = parse_events(&body, league)?;

        let quota = self.quota();
        debug!(
            league,
            games = games.len(),
            rejected,
            remaining = ?quota.remaining,
            used = ?quota.used,
            "Odds response decoded"
        );

        Ok(games)
    }

    async fn ping(&self) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}/sports", self.base_url))
            .query(&[("apiKey", self.api_key.expose_secret().as_str())])
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Odds provider unreachable")?;
        self.record_quota(resp.headers());
        if !resp.status().is_success() {
            anyhow::bail!("Odds provider returned HTTP {}", resp.status());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
