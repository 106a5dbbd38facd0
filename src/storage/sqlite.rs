//! SQLite store (sqlx).
//!
//! Timestamps are stored as RFC 3339 text with fixed microsecond precision
//! so lexical order matches chronological order. The schema is created on
//! connect.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::Store;
use crate::types::{
    AnalyticsUpdate, BotError, BotState, BotStatus, DailyAnalytics, LogEntry, LogKind,
    Opportunity, OpportunityRecord, OpportunityStatus, SettlementTally, StatusUpdate,
};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS bot_status (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        state TEXT NOT NULL,
        last_analysis TEXT,
        next_analysis TEXT,
        games_analyzed_today INTEGER NOT NULL DEFAULT 0,
        opportunities_found_today INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS opportunities (
        id TEXT PRIMARY KEY,
        game_id TEXT NOT NULL,
        league TEXT NOT NULL,
        home_team TEXT NOT NULL,
        away_team TEXT NOT NULL,
        market TEXT NOT NULL,
        selection TEXT NOT NULL,
        odds REAL NOT NULL,
        value REAL NOT NULL,
        confidence REAL NOT NULL,
        implied_probability REAL NOT NULL,
        calculated_probability REAL NOT NULL,
        bookmaker TEXT NOT NULL,
        commence_time TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_opportunities_created_at ON opportunities (created_at)",
    r#"CREATE TABLE IF NOT EXISTS daily_analytics (
        date TEXT PRIMARY KEY,
        games_analyzed INTEGER NOT NULL DEFAULT 0,
        opportunities_found INTEGER NOT NULL DEFAULT 0,
        total_value REAL NOT NULL DEFAULT 0,
        success_rate REAL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS activity_logs (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        message TEXT NOT NULL,
        details TEXT,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_activity_logs_created_at ON activity_logs (created_at)",
];

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Bad timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

fn to_u32(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

fn to_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the file if missing) and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid SQLite URL: {url}"))?
            .create_if_missing(true);

        // Every connection to `:memory:` is a separate database.
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {url}"))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("Failed to create schema")?;
        }

        Ok(Self { pool })
    }

    fn row_to_status(row: &SqliteRow) -> Result<BotStatus> {
        let state: String = row.try_get("state")?;
        Ok(BotStatus {
            state: state.parse::<BotState>()?,
            last_analysis: parse_opt_ts(row.try_get("last_analysis")?)?,
            next_analysis: parse_opt_ts(row.try_get("next_analysis")?)?,
            games_analyzed_today: to_u32(row.try_get("games_analyzed_today")?),
            opportunities_found_today: to_u32(row.try_get("opportunities_found_today")?),
            updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
        })
    }

    fn row_to_opportunity(row: &SqliteRow) -> Result<OpportunityRecord> {
        let status: String = row.try_get("status")?;
        Ok(OpportunityRecord {
            id: row.try_get("id")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
            opportunity: Opportunity {
                game_id: row.try_get("game_id")?,
                league: row.try_get("league")?,
                home_team: row.try_get("home_team")?,
                away_team: row.try_get("away_team")?,
                market: row.try_get("market")?,
                selection: row.try_get("selection")?,
                odds: row.try_get("odds")?,
                value: row.try_get("value")?,
                confidence: row.try_get("confidence")?,
                implied_probability: row.try_get("implied_probability")?,
                calculated_probability: row.try_get("calculated_probability")?,
                bookmaker: row.try_get("bookmaker")?,
                commence_time: parse_ts(&row.try_get::<String, _>("commence_time")?)?,
                status: status.parse::<OpportunityStatus>()?,
            },
        })
    }

    fn row_to_analytics(row: &SqliteRow) -> Result<DailyAnalytics> {
        let date: String = row.try_get("date")?;
        Ok(DailyAnalytics {
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Bad date in database: {date}"))?,
            games_analyzed: to_u32(row.try_get("games_analyzed")?),
            opportunities_found: to_u32(row.try_get("opportunities_found")?),
            total_value: row.try_get("total_value")?,
            success_rate: row.try_get("success_rate")?,
        })
    }

    fn row_to_log(row: &SqliteRow) -> Result<LogEntry> {
        let kind: String = row.try_get("kind")?;
        let details: Option<String> = row.try_get("details")?;
        Ok(LogEntry {
            id: row.try_get("id")?,
            kind: kind.parse::<LogKind>()?,
            message: row.try_get("message")?,
            details: details
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("Bad log details JSON")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        })
    }

    async fn analytics_row(&self, date: NaiveDate) -> Result<Option<DailyAnalytics>> {
        let row = sqlx::query("SELECT * FROM daily_analytics WHERE date = ?")
            .bind(date.format("%Y-%m-%d").to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_analytics).transpose()
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get_status(&self) -> Result<Option<BotStatus>> {
        let row = sqlx::query("SELECT * FROM bot_status WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_status).transpose()
    }

    async fn set_status(&self, update: StatusUpdate) -> Result<()> {
        let mut status = self
            .get_status()
            .await?
            .unwrap_or_else(|| BotStatus::new(BotState::Offline));
        status.apply(&update);

        sqlx::query(
            r#"INSERT INTO bot_status
                (id, state, last_analysis, next_analysis,
                 games_analyzed_today, opportunities_found_today, updated_at)
               VALUES (1, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 state = excluded.state,
                 last_analysis = excluded.last_analysis,
                 next_analysis = excluded.next_analysis,
                 games_analyzed_today = excluded.games_analyzed_today,
                 opportunities_found_today = excluded.opportunities_found_today,
                 updated_at = excluded.updated_at"#,
        )
        .bind(status.state.as_str())
        .bind(status.last_analysis.map(ts))
        .bind(status.next_analysis.map(ts))
        .bind(i64::from(status.games_analyzed_today))
        .bind(i64::from(status.opportunities_found_today))
        .bind(ts(status.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(state = %status.state, "Status updated");
        Ok(())
    }

    async fn list_recent_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM opportunities ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_opportunity).collect()
    }

    async fn create_opportunity(&self, o: &Opportunity) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO opportunities
                (id, game_id, league, home_team, away_team, market, selection,
                 odds, value, confidence, implied_probability, calculated_probability,
                 bookmaker, commence_time, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&o.game_id)
        .bind(&o.league)
        .bind(&o.home_team)
        .bind(&o.away_team)
        .bind(&o.market)
        .bind(&o.selection)
        .bind(o.odds)
        .bind(o.value)
        .bind(o.confidence)
        .bind(o.implied_probability)
        .bind(o.calculated_probability)
        .bind(&o.bookmaker)
        .bind(ts(o.commence_time))
        .bind(o.status.as_str())
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .context("Failed to insert opportunity")?;
        Ok(id)
    }

    async fn set_opportunity_status(&self, id: &str, status: OpportunityStatus) -> Result<()> {
        let result = sqlx::query("UPDATE opportunities SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BotError::NotFound(format!("opportunity {id}")).into());
        }
        Ok(())
    }

    async fn list_daily_analytics(&self, days: usize) -> Result<Vec<DailyAnalytics>> {
        let rows = sqlx::query("SELECT * FROM daily_analytics ORDER BY date DESC LIMIT ?")
            .bind(to_limit(days))
            .fetch_all(&self.pool)
            .await?;
        let mut out = rows
            .iter()
            .map(Self::row_to_analytics)
            .collect::<Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }

    async fn upsert_daily_analytics(&self, date: NaiveDate, update: AnalyticsUpdate) -> Result<()> {
        let mut row = self
            .analytics_row(date)
            .await?
            .unwrap_or_else(|| DailyAnalytics::empty(date));
        row.apply(&update);

        sqlx::query(
            r#"INSERT INTO daily_analytics
                (date, games_analyzed, opportunities_found, total_value, success_rate, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(date) DO UPDATE SET
                 games_analyzed = excluded.games_analyzed,
                 opportunities_found = excluded.opportunities_found,
                 total_value = excluded.total_value,
                 success_rate = excluded.success_rate,
                 updated_at = excluded.updated_at"#,
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .bind(i64::from(row.games_analyzed))
        .bind(i64::from(row.opportunities_found))
        .bind(row.total_value)
        .bind(row.success_rate)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn settlement_tally(&self, date: NaiveDate) -> Result<SettlementTally> {
        let rows = sqlx::query(
            r#"SELECT status, COUNT(*) AS n FROM opportunities
               WHERE substr(created_at, 1, 10) = ?
               GROUP BY status"#,
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut tally = SettlementTally::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n = to_u32(row.try_get("n")?);
            match status.parse::<OpportunityStatus>()? {
                OpportunityStatus::Won => tally.won += n,
                OpportunityStatus::Lost => tally.lost += n,
                OpportunityStatus::Pending | OpportunityStatus::Void => {}
            }
        }
        Ok(tally)
    }

    async fn append_log(
        &self,
        kind: LogKind,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity_logs (id, kind, message, details, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind.as_str())
        .bind(message)
        .bind(details.map(|d| d.to_string()))
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM activity_logs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_log).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    async fn memory_db() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_contract() {
        contract::run(&memory_db().await).await;
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let path = std::env::temp_dir().join(format!("valuebet_test_{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());

        let store = SqliteStore::connect(&url).await.unwrap();
        store.append_log(LogKind::Info, "first open", None).await.unwrap();
        drop(store);

        let reopened = SqliteStore::connect(&url).await.unwrap();
        let logs = reopened.list_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "first open");

        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_timestamps_sort_lexically() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(ts(early) < ts(late));
        assert_eq!(parse_ts(&ts(early)).unwrap().timestamp_micros(), early.timestamp_micros());
    }

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        assert!(SqliteStore::connect("postgres://nope").await.is_err());
    }
}
