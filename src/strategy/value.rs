//! Value detection.
//!
//! Compares a fixed heuristic probability per outcome role with the
//! bookmaker's implied probability and emits every priced outcome whose
//! edge and confidence clear the configured floors.

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::types::{Game, Opportunity, OpportunityStatus, MARKET_H2H, MARKET_TOTALS};

/// Heuristic win probability for the home side.
pub const HOME_PROBABILITY: f64 = 0.45;
/// Heuristic win probability for the away side.
pub const AWAY_PROBABILITY: f64 = 0.35;
/// Heuristic probability for anything else in the 1X2 market (the draw).
pub const DRAW_PROBABILITY: f64 = 0.20;

/// Heuristic probabilities for the Over/Under 2.5 line.
pub const OVER_PROBABILITY: f64 = 0.55;
pub const UNDER_PROBABILITY: f64 = 0.45;
pub const TOTALS_LINE: f64 = 2.5;

const CONFIDENCE_BASE: f64 = 0.6;
const CONFIDENCE_SLOPE: f64 = 2.0;

/// Slack applied to the edge/confidence floors. `0.35 * 3.0` style
/// products land one ulp under the nominal threshold in binary floating
/// point; a candidate sitting exactly on a floor must still pass.
pub const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Display label of the head-to-head market.
pub const LABEL_H2H: &str = "1X2";
/// Display label of the totals market.
pub const LABEL_TOTALS: &str = "Over/Under";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Acceptance bounds for a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueConfig {
    pub min_odds: f64,
    pub max_odds: f64,
    pub min_edge: f64,
    pub min_confidence: f64,
    pub include_totals: bool,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            min_odds: 1.5,
            max_odds: 5.0,
            min_edge: 0.05,
            min_confidence: 0.70,
            include_totals: false,
        }
    }
}

impl From<&AnalysisConfig> for ValueConfig {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            min_odds: cfg.min_odds,
            max_odds: cfg.max_odds,
            min_edge: cfg.min_edge,
            min_confidence: cfg.min_confidence,
            include_totals: cfg.include_totals,
        }
    }
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Role of an outcome within the 1X2 market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeRole {
    Home,
    Away,
    Draw,
}

impl OutcomeRole {
    /// Anything that is neither team is treated as the draw.
    pub fn classify(outcome: &str, game: &Game) -> Self {
        if outcome == game.home_team {
            OutcomeRole::Home
        } else if outcome == game.away_team {
            OutcomeRole::Away
        } else {
            OutcomeRole::Draw
        }
    }

    pub fn probability(&self) -> f64 {
        match self {
            OutcomeRole::Home => HOME_PROBABILITY,
            OutcomeRole::Away => AWAY_PROBABILITY,
            OutcomeRole::Draw => DRAW_PROBABILITY,
        }
    }
}

/// Reciprocal of decimal odds.
pub fn implied_probability(odds: f64) -> f64 {
    1.0 / odds
}

/// Fractional advantage of `calculated` over the implied probability.
pub fn edge(calculated: f64, odds: f64) -> f64 {
    let implied = implied_probability(odds);
    (calculated - implied) / implied
}

/// `min(0.6 + 2 * edge, 1.0)`.
pub fn confidence(edge: f64) -> f64 {
    (CONFIDENCE_BASE + edge * CONFIDENCE_SLOPE).min(1.0)
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless per-game value detector.
#[derive(Debug, Clone, Default)]
pub struct ValueDetector {
    config: ValueConfig,
}

impl ValueDetector {
    pub fn new(config: ValueConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    /// Evaluate every bookmaker's price independently; the same selection
    /// offered by several bookmakers can yield several candidates.
    pub fn detect(&self, game: &Game) -> Vec<Opportunity> {
        let mut found = Vec::new();

        for quote in game.quotes_for(MARKET_H2H) {
            for outcome in &quote.outcomes {
                let role = OutcomeRole::classify(&outcome.name, game);
                if let Some(opp) = self.evaluate(
                    game,
                    LABEL_H2H,
                    &outcome.name,
                    outcome.price,
                    role.probability(),
                    &quote.bookmaker,
                ) {
                    found.push(opp);
                }
            }
        }

        if self.config.include_totals {
            for quote in game.quotes_for(MARKET_TOTALS) {
                for outcome in &quote.outcomes {
                    if outcome.point != Some(TOTALS_LINE) {
                        continue;
                    }
                    let calculated = match outcome.name.as_str() {
                        "Over" => OVER_PROBABILITY,
                        "Under" => UNDER_PROBABILITY,
                        _ => continue,
                    };
                    let selection = format!("{} {}", outcome.name, TOTALS_LINE);
                    if let Some(opp) = self.evaluate(
                        game,
                        LABEL_TOTALS,
                        &selection,
                        outcome.price,
                        calculated,
                        &quote.bookmaker,
                    ) {
                        found.push(opp);
                    }
                }
            }
        }

        if !found.is_empty() {
            debug!(game = %game, candidates = found.len(), "Value candidates");
        }
        found
    }

    /// Run [`detect`](Self::detect) over many games and concatenate.
    pub fn detect_all(&self, games: &[Game]) -> Vec<Opportunity> {
        games.iter().flat_map(|g| self.detect(g)).collect()
    }

    fn evaluate(
        &self,
        game: &Game,
        market: &str,
        selection: &str,
        odds: f64,
        calculated: f64,
        bookmaker: &str,
    ) -> Option<Opportunity> {
        if !(odds.is_finite() && odds >= self.config.min_odds && odds <= self.config.max_odds) {
            return None;
        }
        let value = edge(calculated, odds);
        if value + THRESHOLD_TOLERANCE < self.config.min_edge {
            return None;
        }
        let confidence = confidence(value);
        if confidence + THRESHOLD_TOLERANCE < self.config.min_confidence {
            return None;
        }

        Some(Opportunity {
            game_id: game.id.clone(),
            league: game.league.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            market: market.to_string(),
            selection: selection.to_string(),
            odds,
            value,
            confidence,
            implied_probability: implied_probability(odds),
            calculated_probability: calculated,
            bookmaker: bookmaker.to_string(),
            commence_time: game.commence_time,
            status: OpportunityStatus::Pending,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookmakerQuote, OutcomePrice};
    use chrono::{Duration, Utc};

    const EPS: f64 = 1e-9;

    fn outcome(name: &str, price: f64) -> OutcomePrice {
        OutcomePrice {
            name: name.to_string(),
            price,
            point: None,
        }
    }

    fn h2h(bookmaker: &str, outcomes: Vec<OutcomePrice>) -> BookmakerQuote {
        BookmakerQuote {
            bookmaker: bookmaker.to_string(),
            market: MARKET_H2H.to_string(),
            outcomes,
        }
    }

    fn make_game(quotes: Vec<BookmakerQuote>) -> Game {
        Game {
            id: "g1".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            league: "soccer_epl".into(),
            commence_time: Utc::now() + Duration::hours(4),
            quotes,
        }
    }

    #[test]
    fn test_closed_form_formulas() {
        for &odds in &[1.01, 1.5, 2.0, 2.75, 3.0, 4.2, 5.0, 12.0] {
            for role in [OutcomeRole::Home, OutcomeRole::Away, OutcomeRole::Draw] {
                let p = role.probability();
                let implied = implied_probability(odds);
                assert!((implied - 1.0 / odds).abs() < EPS);
                let expected = (p - 1.0 / odds) / (1.0 / odds);
                assert!((edge(p, odds) - expected).abs() < EPS, "odds={odds} role={role:?}");
            }
        }
    }

    #[test]
    fn test_confidence_clamps_at_one() {
        assert!((confidence(0.2) - 1.0).abs() < EPS);
        assert!(confidence(0.2) <= 1.0);
        assert_eq!(confidence(0.5), 1.0);
        assert!((confidence(0.05) - 0.70).abs() < EPS);
        assert!((confidence(0.0) - 0.6).abs() < EPS);
    }

    #[test]
    fn test_just_below_floor_rejected() {
        // Away @ 2.99: edge = 0.35 * 2.99 - 1 ≈ 0.0465.
        let game = make_game(vec![h2h("Book", vec![outcome("B", 2.99)])]);
        assert!(ValueDetector::default().detect(&game).is_empty());
    }

    #[test]
    fn test_role_classification() {
        let game = make_game(Vec::new());
        assert_eq!(OutcomeRole::classify("A", &game), OutcomeRole::Home);
        assert_eq!(OutcomeRole::classify("B", &game), OutcomeRole::Away);
        assert_eq!(OutcomeRole::classify("Draw", &game), OutcomeRole::Draw);
        assert_eq!(OutcomeRole::classify("Tie", &game), OutcomeRole::Draw);
    }

    #[test]
    fn test_home_rejected_away_accepted() {
        // A @ 2.00: implied 0.50, calc 0.45 → edge −0.10.
        // B @ 3.00: implied 0.333…, calc 0.35 → edge 0.05, confidence 0.70.
        let game = make_game(vec![h2h("Book", vec![outcome("A", 2.0), outcome("B", 3.0)])]);
        let found = ValueDetector::default().detect(&game);
        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.selection, "B");
        assert_eq!(opp.market, LABEL_H2H);
        assert!((opp.value - 0.05).abs() < EPS);
        assert!((opp.confidence - 0.70).abs() < EPS);
        assert!((opp.implied_probability - 1.0 / 3.0).abs() < EPS);
        assert_eq!(opp.calculated_probability, AWAY_PROBABILITY);
        assert_eq!(opp.bookmaker, "Book");
        assert_eq!(opp.status, OpportunityStatus::Pending);
    }

    #[test]
    fn test_odds_range_enforced() {
        // Draw @ 5.5 has a big edge (0.2 * 5.5 - 1 = 0.1) but is above max_odds.
        // Home @ 1.4 is below min_odds.
        let game = make_game(vec![h2h("Book", vec![outcome("A", 1.4), outcome("Draw", 5.5)])]);
        assert!(ValueDetector::default().detect(&game).is_empty());

        // Draw @ 5.0 exactly: edge 0.0, rejected on edge instead.
        let game = make_game(vec![h2h("Book", vec![outcome("Draw", 5.0)])]);
        assert!(ValueDetector::default().detect(&game).is_empty());
    }

    #[test]
    fn test_each_bookmaker_evaluated_independently() {
        let game = make_game(vec![
            h2h("Book1", vec![outcome("A", 2.5)]),
            h2h("Book2", vec![outcome("A", 2.6)]),
            h2h("Book3", vec![outcome("A", 2.0)]),
        ]);
        let found = ValueDetector::default().detect(&game);
        let books: Vec<&str> = found.iter().map(|o| o.bookmaker.as_str()).collect();
        assert_eq!(books, vec!["Book1", "Book2"]);
    }

    #[test]
    fn test_non_h2h_markets_ignored_by_default() {
        let game = make_game(vec![BookmakerQuote {
            bookmaker: "Book".into(),
            market: MARKET_TOTALS.into(),
            outcomes: vec![OutcomePrice {
                name: "Over".into(),
                price: 2.2,
                point: Some(2.5),
            }],
        }]);
        assert!(ValueDetector::default().detect(&game).is_empty());
    }

    #[test]
    fn test_totals_opt_in() {
        let totals = BookmakerQuote {
            bookmaker: "Book".into(),
            market: MARKET_TOTALS.into(),
            outcomes: vec![
                OutcomePrice { name: "Over".into(), price: 2.2, point: Some(2.5) },
                OutcomePrice { name: "Under".into(), price: 1.7, point: Some(2.5) },
                OutcomePrice { name: "Over".into(), price: 3.0, point: Some(3.5) },
            ],
        };
        let game = make_game(vec![totals]);
        let detector = ValueDetector::new(ValueConfig {
            include_totals: true,
            ..ValueConfig::default()
        });

        let found = detector.detect(&game);
        // Over 2.5 @ 2.2: edge 0.21 → accepted. Under @ 1.7: edge < 0. 3.5 line ignored.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].market, LABEL_TOTALS);
        assert_eq!(found[0].selection, "Over 2.5");
        assert_eq!(found[0].confidence, 1.0);
    }

    #[test]
    fn test_every_candidate_respects_bounds() {
        let mut quotes = Vec::new();
        let mut price = 1.05;
        while price < 8.0 {
            quotes.push(h2h(
                &format!("Book{price:.2}"),
                vec![outcome("A", price), outcome("B", price), outcome("Draw", price)],
            ));
            price += 0.07;
        }
        let game = make_game(quotes);

        for cfg in [
            ValueConfig::default(),
            ValueConfig { min_edge: 0.2, min_confidence: 0.9, ..ValueConfig::default() },
            ValueConfig { min_odds: 2.0, max_odds: 3.0, ..ValueConfig::default() },
        ] {
            let found = ValueDetector::new(cfg.clone()).detect(&game);
            assert!(!found.is_empty());
            for opp in found {
                assert!(opp.odds >= cfg.min_odds && opp.odds <= cfg.max_odds);
                assert!(opp.value >= cfg.min_edge - THRESHOLD_TOLERANCE);
                assert!(opp.confidence >= cfg.min_confidence - THRESHOLD_TOLERANCE);
                assert!((opp.confidence - (0.6 + 2.0 * opp.value).min(1.0)).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_detect_all_concatenates() {
        let g1 = make_game(vec![h2h("Book", vec![outcome("A", 2.5)])]);
        let mut g2 = make_game(vec![h2h("Book", vec![outcome("B", 3.2)])]);
        g2.id = "g2".into();
        let found = ValueDetector::default().detect_all(&[g1, g2]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].game_id, "g2");
    }
}
