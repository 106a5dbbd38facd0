//! The Odds API client against a local stub server.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;

use valuebet::engine::pacing::MinInterval;
use valuebet::odds::the_odds_api::TheOddsApiClient;
use valuebet::odds::{OddsFetcher, OddsSource};
use valuebet::strategy::value::ValueDetector;

use crate::fakes::test_config;

const API_KEY: &str = "stub-key-123";

async fn odds_handler(
    Path(sport): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert("x-requests-remaining", "497".parse().unwrap());
    headers.insert("x-requests-used", "3".parse().unwrap());

    if params.get("apiKey").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, headers, "bad key".to_string());
    }
    if sport == "soccer_unknown" {
        return (StatusCode::NOT_FOUND, headers, "unknown sport".to_string());
    }
    assert_eq!(params.get("oddsFormat").map(String::as_str), Some("decimal"));

    let soon = (Utc::now() + Duration::hours(5)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let later = (Utc::now() + Duration::hours(48)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let body = serde_json::json!([
        {
            "id": "evt-1",
            "sport_key": sport,
            "commence_time": soon,
            "home_team": "A",
            "away_team": "B",
            "bookmakers": [{
                "key": "pinnacle",
                "title": "Pinnacle",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "A", "price": 2.0},
                        {"name": "B", "price": 3.0},
                        {"name": "Draw", "price": 3.4}
                    ]
                }]
            }]
        },
        {
            "id": "evt-2",
            "commence_time": later,
            "home_team": "C",
            "away_team": "D",
            "bookmakers": []
        },
        { "id": "evt-broken", "home_team": "E" }
    ]);
    (StatusCode::OK, headers, body.to_string())
}

async fn sports_handler() -> &'static str {
    "[]"
}

/// Serve the stub on an ephemeral port and return its base URL.
async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/v4/sports", get(sports_handler))
        .route("/v4/sports/:sport/odds", get(odds_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v4")
}

fn client(base_url: String, key: &str) -> TheOddsApiClient {
    let mut cfg = test_config(&["soccer_epl"]).odds;
    cfg.base_url = base_url;
    TheOddsApiClient::new(&cfg, SecretString::new(key.to_string())).unwrap()
}

#[tokio::test]
async fn test_fetch_decodes_and_drops_malformed_events() {
    let client = client(spawn_stub().await, API_KEY);

    let games = client.fetch_league("soccer_epl").await.unwrap();
    let ids: Vec<&str> = games.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["evt-1", "evt-2"]);
    assert_eq!(games[0].league, "soccer_epl");
    assert_eq!(games[0].quotes[0].bookmaker, "Pinnacle");
    assert_eq!(games[0].quotes[0].outcomes.len(), 3);

    let quota = client.quota();
    assert_eq!(quota.remaining, Some(497));
    assert_eq!(quota.used, Some(3));
    assert!(client.ping().await.is_ok());
}

#[tokio::test]
async fn test_http_error_does_not_leak_key() {
    let base = spawn_stub().await;
    let client = client(base, "wrong-key-456");
    let err = client.fetch_league("soccer_epl").await.unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("401"));
    assert!(!text.contains("wrong-key-456"));
}

#[tokio::test]
async fn test_fetch_window_and_detection_through_real_client() {
    let source: Arc<dyn OddsSource> = Arc::new(client(spawn_stub().await, API_KEY));
    let fetcher = OddsFetcher::new(source, Box::new(MinInterval::none()), Duration::hours(24));

    let leagues = vec!["soccer_epl".to_string(), "soccer_unknown".to_string()];
    let report = fetcher.fetch_all(&leagues, Utc::now()).await;

    // evt-2 is 48 h out and falls outside the window.
    assert_eq!(report.games.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].league, "soccer_unknown");

    let picks = ValueDetector::default().detect_all(&report.games);
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].selection, "B");
    assert!((picks[0].value - 0.05).abs() < 1e-9);
    assert!((picks[0].confidence - 0.70).abs() < 1e-9);
}
