//! In-memory store.
//!
//! Used when no database is configured, and in tests. State lives for the
//! lifetime of the process only.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::Store;
use crate::types::{
    AnalyticsUpdate, BotError, BotState, BotStatus, DailyAnalytics, LogEntry, LogKind,
    Opportunity, OpportunityRecord, OpportunityStatus, SettlementTally, StatusUpdate,
};

/// Oldest log entries are dropped beyond this many.
const MAX_LOGS: usize = 1_000;

/// Oldest opportunities are dropped beyond this many.
const MAX_OPPORTUNITIES: usize = 5_000;

#[derive(Default)]
struct Inner {
    status: Option<BotStatus>,
    opportunities: Vec<OpportunityRecord>,
    analytics: BTreeMap<NaiveDate, DailyAnalytics>,
    logs: Vec<LogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_status(&self) -> Result<Option<BotStatus>> {
        Ok(self.inner.read().await.status.clone())
    }

    async fn set_status(&self, update: StatusUpdate) -> Result<()> {
        let mut inner = self.inner.write().await;
        let status = inner
            .status
            .get_or_insert_with(|| BotStatus::new(BotState::Offline));
        status.apply(&update);
        debug!(state = %status.state, "Status updated");
        Ok(())
    }

    async fn list_recent_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.opportunities.iter().rev().take(limit).cloned().collect())
    }

    async fn create_opportunity(&self, opportunity: &Opportunity) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.write().await;
        inner.opportunities.push(OpportunityRecord {
            id: id.clone(),
            created_at: Utc::now(),
            opportunity: opportunity.clone(),
        });
        if inner.opportunities.len() > MAX_OPPORTUNITIES {
            let excess = inner.opportunities.len() - MAX_OPPORTUNITIES;
            inner.opportunities.drain(..excess);
        }
        Ok(id)
    }

    async fn set_opportunity_status(&self, id: &str, status: OpportunityStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .opportunities
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BotError::NotFound(format!("opportunity {id}")))?;
        record.opportunity.status = status;
        Ok(())
    }

    async fn list_daily_analytics(&self, days: usize) -> Result<Vec<DailyAnalytics>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<DailyAnalytics> =
            inner.analytics.values().rev().take(days).cloned().collect();
        rows.reverse();
        Ok(rows)
    }

    async fn upsert_daily_analytics(&self, date: NaiveDate, update: AnalyticsUpdate) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .analytics
            .entry(date)
            .or_insert_with(|| DailyAnalytics::empty(date))
            .apply(&update);
        Ok(())
    }

    async fn settlement_tally(&self, date: NaiveDate) -> Result<SettlementTally> {
        let inner = self.inner.read().await;
        let mut tally = SettlementTally::default();
        for record in inner
            .opportunities
            .iter()
            .filter(|r| r.created_at.date_naive() == date)
        {
            match record.opportunity.status {
                OpportunityStatus::Won => tally.won += 1,
                OpportunityStatus::Lost => tally.lost += 1,
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
        let mut inner = self.inner.write().await;
        inner.logs.push(LogEntry {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.to_string(),
            details,
            created_at: Utc::now(),
        });
        if inner.logs.len() > MAX_LOGS {
            let excess = inner.logs.len() - MAX_LOGS;
            inner.logs.drain(..excess);
        }
        Ok(())
    }

    async fn list_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.logs.iter().rev().take(limit).cloned().collect())
    }
}
