//! Persistence layer.
//!
//! The `Store` trait is everything the analysis cycle and the dashboard
//! need from a backend. Two implementations exist: `SqliteStore` for
//! durable storage and `MemoryStore` when no database is configured. The
//! choice is made once at startup by [`open_store`].

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use crate::types::{
    AnalyticsUpdate, BotStatus, DailyAnalytics, LogEntry, LogKind, Opportunity,
    OpportunityRecord, OpportunityStatus, SettlementTally, StatusUpdate,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Backend-agnostic persistence interface.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for status reporting.
    fn backend(&self) -> &'static str;

    /// The singleton status record, if one was ever written.
    async fn get_status(&self) -> Result<Option<BotStatus>>;

    /// Merge a partial update into the status record, creating it if needed.
    async fn set_status(&self, update: StatusUpdate) -> Result<()>;

    /// Newest first.
    async fn list_recent_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>>;

    /// Append an opportunity; returns the assigned id.
    async fn create_opportunity(&self, opportunity: &Opportunity) -> Result<String>;

    /// Settle (or reopen) an opportunity. Fails with `BotError::NotFound`
    /// for an unknown id.
    async fn set_opportunity_status(&self, id: &str, status: OpportunityStatus) -> Result<()>;

    /// The most recent `days` rows, oldest first.
    async fn list_daily_analytics(&self, days: usize) -> Result<Vec<DailyAnalytics>>;

    /// Overwrite the given fields of one day's row, creating it if needed.
    async fn upsert_daily_analytics(&self, date: NaiveDate, update: AnalyticsUpdate) -> Result<()>;

    /// Won/lost counts over opportunities created on `date` (UTC).
    async fn settlement_tally(&self, date: NaiveDate) -> Result<SettlementTally>;

    async fn append_log(
        &self,
        kind: LogKind,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Newest first.
    async fn list_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;
}

/// Pick the backend from configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>> {
    match config.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            let store = SqliteStore::connect(url).await?;
            info!(url, "Using SQLite store");
            Ok(Arc::new(store))
        }
        None => {
            info!("No database configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
