//! Message builders for every cycle event.
//!
//! All dynamic text is HTML-escaped before it is embedded in Telegram
//! HTML markup.

use chrono::{DateTime, Utc};

use super::{InlineButton, Message};
use crate::types::Opportunity;

const DISCLAIMER: &str =
    "⚠️ <i>Bet responsibly. This is an automated suggestion, not advice.</i>";

/// Escape the three characters Telegram's HTML parse mode treats specially.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Longest team, market or bookmaker name embedded in a message.
const MAX_NAME_CHARS: usize = 120;

/// Longest error reason embedded in a message.
const MAX_REASON_CHARS: usize = 500;

/// Cut raw text to `max` characters, then escape it.
///
/// Cutting before escaping keeps entities like `&amp;` whole.
pub fn clipped(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return escape_html(s);
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    escape_html(&cut)
}

/// `soccer_spain_la_liga` → `SPAIN LA LIGA`.
pub fn league_label(league: &str) -> String {
    league
        .strip_prefix("soccer_")
        .unwrap_or(league)
        .replace('_', " ")
        .to_uppercase()
}

/// One star per 20% confidence, at most five.
pub fn stars(confidence: f64) -> String {
    let n = (confidence * 5.0).floor().clamp(0.0, 5.0) as usize;
    "⭐".repeat(n)
}

fn when(t: DateTime<Utc>) -> String {
    t.format("%d/%m %H:%M UTC").to_string()
}

pub fn start() -> Message {
    Message::text(
        "🤖 <b>ANALYSIS STARTED</b>\n\n\
         🔍 Collecting upcoming games...\n\
         📊 Looking for value...",
    )
}

pub fn no_games(window_hours: i64, next: DateTime<Utc>) -> Message {
    Message::text(format!(
        "📭 <b>NO GAMES FOUND</b>\n\n\
         ℹ️ No games in the next {window_hours} hours for the monitored leagues.\n\
         ⏰ Next check: {}",
        when(next)
    ))
}

/// Cycle summary. With no candidates it says so instead of announcing picks.
pub fn summary(games: usize, found: usize, selected: usize, next: DateTime<Utc>) -> Message {
    if found == 0 {
        Message::text(format!(
            "📊 <b>ANALYSIS COMPLETE</b>\n\n\
             • Games analysed: {games}\n\
             • Opportunities: 0\n\n\
             ℹ️ Nothing met the criteria.\n\
             ⏰ Next analysis: {}",
            when(next)
        ))
    } else {
        Message::text(format!(
            "🎉 <b>OPPORTUNITIES FOUND</b>\n\n\
             📊 Games analysed: {games}\n\
             🎯 Opportunities: {found}\n\n\
             📱 Sending the best {selected}..."
        ))
    }
}

pub fn opportunity(o: &Opportunity, dashboard_url: Option<&str>) -> Message {
    let text = format!(
        "⚽ <b>VALUE BET</b> ⚽\n\n\
         🏆 <b>League:</b> {league}\n\
         ⚽ <b>Game:</b> {home} vs {away}\n\
         🕐 <b>Kick-off:</b> {kickoff}\n\n\
         💡 <b>Market:</b> {market}\n\
         🎯 <b>Selection:</b> {selection}\n\
         💰 <b>Odds:</b> {odds:.2} ({bookmaker})\n\n\
         📊 <b>Analysis:</b>\n\
         • Estimated probability: {calc:.1}%\n\
         • Implied probability: {implied:.1}%\n\
         • Value: {value:.2}%\n\
         • Confidence: {conf:.1}% {stars}\n\n\
         {DISCLAIMER}",
        league = clipped(&league_label(&o.league), MAX_NAME_CHARS),
        home = clipped(&o.home_team, MAX_NAME_CHARS),
        away = clipped(&o.away_team, MAX_NAME_CHARS),
        kickoff = when(o.commence_time),
        market = clipped(&o.market, MAX_NAME_CHARS),
        selection = clipped(&o.selection, MAX_NAME_CHARS),
        odds = o.odds,
        bookmaker = clipped(&o.bookmaker, MAX_NAME_CHARS),
        calc = o.calculated_probability * 100.0,
        implied = o.implied_probability * 100.0,
        value = o.value * 100.0,
        conf = o.confidence * 100.0,
        stars = stars(o.confidence),
    );

    let msg = Message::text(text);
    match dashboard_url {
        Some(url) if !url.trim().is_empty() => msg.with_button(InlineButton::link("📊 Dashboard", url)),
        _ => msg,
    }
}

/// Operator-requested delivery check.
pub fn test_notification(at: DateTime<Utc>) -> Message {
    Message::text(format!(
        "🧪 <b>TEST NOTIFICATION</b>\n\n\
         ✅ Notifications are working.\n\
         🕐 {}",
        at.format("%d/%m/%Y %H:%M:%S UTC")
    ))
}

pub fn error(reason: &str, at: DateTime<Utc>) -> Message {
    Message::text(format!(
        "🚨 <b>BOT ERROR</b> 🚨\n\n\
         ⏰ <b>Time:</b> {}\n\
         ❌ <b>Error:</b> {}\n\n\
         The bot is offline until the next scheduled run.",
        at.format("%d/%m/%Y %H:%M:%S UTC"),
        clipped(reason, MAX_REASON_CHARS)
    ))
}
