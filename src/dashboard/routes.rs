//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{Analyzer, CycleOutcome};
use crate::types::{
    BotError, BotStatus, DailyAnalytics, LogEntry, OpportunityRecord, OpportunityStatus,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub analyzer: Arc<Analyzer>,
}

impl DashboardState {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Wraps any handler failure; typed `BotError`s pick the status code.
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<BotError> for ApiError {
    fn from(e: BotError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<BotError>() {
            Some(BotError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(BotError::InvalidStatus(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %format!("{:#}", self.0), "Dashboard request failed");
        }
        (status, Json(ErrorBody { error: format!("{:#}", self.0) })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Persisted status record; absent before the first cycle.
    pub status: Option<BotStatus>,
    pub running: bool,
    pub paused: bool,
    pub storage: &'static str,
    pub provider_reachable: bool,
    pub notifier_reachable: bool,
    pub schedule_hours: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct TestNotificationResponse {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettleResponse {
    pub id: String,
    pub status: OpportunityStatus,
}

const DEFAULT_OPPORTUNITIES: usize = 20;
const MAX_OPPORTUNITIES: usize = 200;
const DEFAULT_DAYS: usize = 7;
const MAX_DAYS: usize = 90;
const DEFAULT_LOGS: usize = 50;
const MAX_LOGS: usize = 500;

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/analyze
pub async fn trigger_analysis(State(state): State<AppState>) -> (StatusCode, Json<CycleOutcome>) {
    info!("Manual analysis requested");
    let outcome = state.analyzer.run_cycle().await;
    let code = match &outcome {
        CycleOutcome::Skipped | CycleOutcome::Paused => StatusCode::CONFLICT,
        CycleOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        CycleOutcome::NoGames { .. } | CycleOutcome::Completed { .. } => StatusCode::OK,
    };
    (code, Json(outcome))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let analyzer = &state.analyzer;
    let (provider, notifier) = tokio::join!(analyzer.source().ping(), analyzer.notifier().ping());

    Ok(Json(StatusResponse {
        status: analyzer.store().get_status().await?,
        running: analyzer.is_running(),
        paused: analyzer.is_paused(),
        storage: analyzer.store().backend(),
        provider_reachable: provider.is_ok(),
        notifier_reachable: notifier.is_ok(),
        schedule_hours: analyzer.schedule().hours().to_vec(),
    }))
}

/// POST /api/bot/start
pub async fn start_bot(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    state.analyzer.resume().await?;
    Ok(Json(ControlResponse { paused: false }))
}

/// POST /api/bot/stop
pub async fn stop_bot(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    state.analyzer.pause().await?;
    Ok(Json(ControlResponse { paused: true }))
}

/// POST /api/notify/test
pub async fn test_notification(
    State(state): State<AppState>,
) -> (StatusCode, Json<TestNotificationResponse>) {
    match state.analyzer.send_test_notification().await {
        Ok(()) => (
            StatusCode::OK,
            Json(TestNotificationResponse { sent: true, error: None }),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(TestNotificationResponse {
                sent: false,
                error: Some(format!("{e:#}")),
            }),
        ),
    }
}

/// GET /api/opportunities?limit=
pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<OpportunityRecord>>> {
    let limit = q.limit.unwrap_or(DEFAULT_OPPORTUNITIES).min(MAX_OPPORTUNITIES);
    Ok(Json(state.analyzer.store().list_recent_opportunities(limit).await?))
}

/// POST /api/opportunities/:id/status
pub async fn settle_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> ApiResult<Json<SettleResponse>> {
    let status: OpportunityStatus = req.status.parse()?;
    state
        .analyzer
        .store()
        .set_opportunity_status(&id, status)
        .await?;
    info!(id = %id, status = %status, "Opportunity settled");
    Ok(Json(SettleResponse { id, status }))
}

/// GET /api/analytics?days=
pub async fn get_analytics(
    State(state): State<AppState>,
    Query(q): Query<DaysQuery>,
) -> ApiResult<Json<Vec<DailyAnalytics>>> {
    let days = q.days.unwrap_or(DEFAULT_DAYS).min(MAX_DAYS);
    Ok(Json(state.analyzer.store().list_daily_analytics(days).await?))
}

/// GET /api/logs?limit=
pub async fn get_logs(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    let limit = q.limit.unwrap_or(DEFAULT_LOGS).min(MAX_LOGS);
    Ok(Json(state.analyzer.store().list_logs(limit).await?))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
