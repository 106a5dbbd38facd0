//! Full analysis cycles against in-memory fakes and both store backends.

use chrono::{Duration, Utc};
use std::sync::Arc;

use valuebet::engine::{Analyzer, CycleOutcome};
use valuebet::storage::{MemoryStore, SqliteStore, Store};
use valuebet::types::{BotState, LogKind, OpportunityStatus};

use crate::fakes::{ab_game, h2h_game, test_config, FakeOddsSource, RecordingNotifier};

const LEAGUES: [&str; 5] = [
    "soccer_brazil_campeonato",
    "soccer_epl",
    "soccer_spain_la_liga",
    "soccer_italy_serie_a",
    "soccer_germany_bundesliga",
];

#[tokio::test]
async fn test_two_failing_leagues_of_five() {
    let mut source = FakeOddsSource::new();
    for (i, league) in LEAGUES.iter().enumerate() {
        source = source.with_games(league, vec![ab_game(&format!("{league}-{i}"))]);
    }
    let source = source.failing("soccer_epl").failing("soccer_italy_serie_a");
    let requests = source.requests();

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let analyzer = Analyzer::from_config(
        &test_config(&LEAGUES),
        Arc::new(source),
        store.clone(),
        notifier.clone(),
    );

    let outcome = analyzer.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Completed { games: 3, found: 3, selected: 3, failed_leagues: 2 }
    );

    // Every league is still asked exactly once, in order.
    assert_eq!(*requests.lock().unwrap(), LEAGUES.to_vec());

    let leagues: Vec<String> = store
        .list_recent_opportunities(10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.opportunity.league)
        .collect();
    assert_eq!(leagues.len(), 3);
    assert!(!leagues.contains(&"soccer_epl".to_string()));
    assert!(!leagues.contains(&"soccer_italy_serie_a".to_string()));

    let error_logs = store
        .list_logs(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|l| l.kind == LogKind::Error)
        .count();
    assert_eq!(error_logs, 2);
}

#[tokio::test]
async fn test_zero_games_cycle() {
    let source = FakeOddsSource::new()
        .with_games("soccer_epl", vec![ab_game("late")])
        .with_games(
            "soccer_spain_la_liga",
            // Outside the 24 h window.
            vec![h2h_game("far", "C", "D", Utc::now() + Duration::hours(30), (2.0, 3.0, 3.4))],
        );
    let mut cfg = test_config(&["soccer_spain_la_liga"]);
    cfg.bot.top_n = 1;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let analyzer = Analyzer::from_config(&cfg, Arc::new(source), store.clone(), notifier.clone());

    assert_eq!(analyzer.run_cycle().await, CycleOutcome::NoGames { failed_leagues: 0 });

    let status = store.get_status().await.unwrap().unwrap();
    assert_eq!(status.state, BotState::Online);
    assert!(status.last_analysis.is_some());
    assert!(store.list_daily_analytics(7).await.unwrap().is_empty());

    let texts = notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("NO GAMES FOUND"));
}

#[tokio::test]
async fn test_top_three_persisted_in_score_order_on_sqlite() {
    let kickoff = Utc::now() + Duration::hours(8);
    // Away prices 3.0 .. 4.2 give rising edges; all qualify.
    let games = (0..7)
        .map(|i| {
            h2h_game(
                &format!("g{i}"),
                &format!("Home{i}"),
                &format!("Away{i}"),
                kickoff,
                (2.0, 3.0 + f64::from(i) * 0.2, 3.4),
            )
        })
        .collect();
    let source = FakeOddsSource::new().with_games("soccer_epl", games);

    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let notifier = Arc::new(RecordingNotifier::new());
    let analyzer = Analyzer::from_config(
        &test_config(&["soccer_epl"]),
        Arc::new(source),
        store.clone(),
        notifier.clone(),
    );

    let outcome = analyzer.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Completed { games: 7, found: 7, selected: 3, failed_leagues: 0 }
    );

    // Persisted best first, so newest first lists them worst to best.
    let selections: Vec<String> = store
        .list_recent_opportunities(10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.opportunity.selection)
        .collect();
    assert_eq!(selections, vec!["Away4", "Away5", "Away6"]);

    // start + summary + three picks
    let texts = notifier.texts();
    assert_eq!(texts.len(), 5);
    assert!(texts[2].contains("Away6"));
    assert!(texts[4].contains("Away4"));

    let analytics = store.list_daily_analytics(1).await.unwrap();
    assert_eq!(analytics[0].games_analyzed, 7);
    assert_eq!(analytics[0].opportunities_found, 7);
    let expected_total: f64 = (0..7).map(|i| 0.35 * (3.0 + f64::from(i) * 0.2) - 1.0).sum();
    assert!((analytics[0].total_value - expected_total).abs() < 1e-9);

    let status = store.get_status().await.unwrap().unwrap();
    assert_eq!(status.state, BotState::Online);
    assert_eq!(status.opportunities_found_today, 7);
    let next = status.next_analysis.unwrap();
    assert!(next > Utc::now());
    assert!(next <= Utc::now() + Duration::hours(24));
}

#[tokio::test]
async fn test_settlement_feeds_next_cycle_success_rate() {
    let source = FakeOddsSource::new().with_games("soccer_epl", vec![ab_game("g1"), ab_game("g2")]);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let analyzer = Analyzer::from_config(
        &test_config(&["soccer_epl"]),
        Arc::new(source),
        store.clone(),
        notifier.clone(),
    );

    analyzer.run_cycle().await;
    let records = store.list_recent_opportunities(10).await.unwrap();
    assert_eq!(records.len(), 2);
    store
        .set_opportunity_status(&records[0].id, OpportunityStatus::Won)
        .await
        .unwrap();
    store
        .set_opportunity_status(&records[1].id, OpportunityStatus::Lost)
        .await
        .unwrap();

    analyzer.run_cycle().await;
    let today = store.list_daily_analytics(1).await.unwrap();
    assert_eq!(today[0].success_rate, Some(50.0));
    // Overwritten per cycle, not accumulated.
    assert_eq!(today[0].games_analyzed, 2);
}

#[tokio::test]
async fn test_notifier_outage_does_not_stop_cycle() {
    let source = FakeOddsSource::new().with_games("soccer_epl", vec![ab_game("g1")]);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    notifier.set_error("Telegram down");

    let analyzer = Analyzer::from_config(
        &test_config(&["soccer_epl"]),
        Arc::new(source),
        store.clone(),
        notifier.clone(),
    );

    assert!(matches!(
        analyzer.run_cycle().await,
        CycleOutcome::Completed { selected: 1, .. }
    ));
    assert_eq!(store.list_recent_opportunities(5).await.unwrap().len(), 1);
    assert_eq!(store.get_status().await.unwrap().unwrap().state, BotState::Online);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_dashboard_link_button() {
    let source = FakeOddsSource::new().with_games("soccer_epl", vec![ab_game("g1")]);
    let mut cfg = test_config(&["soccer_epl"]);
    cfg.telegram.dashboard_url = Some("https://bets.example/dashboard".into());

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let analyzer = Analyzer::from_config(&cfg, Arc::new(source), store, notifier.clone());
    analyzer.run_cycle().await;

    let messages = notifier.messages();
    let pick = messages.last().unwrap();
    assert_eq!(pick.buttons.len(), 1);
    assert_eq!(pick.buttons[0].url.as_deref(), Some("https://bets.example/dashboard"));
    assert!(messages[0].buttons.is_empty());
}
