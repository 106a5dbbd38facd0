//! Dashboard: Axum JSON API for monitoring and manual control.
//!
//! Exposes the bot status, recent opportunities, daily analytics and the
//! activity log, plus operator controls: a manual analysis trigger,
//! pause/resume of scheduled runs, a test notification and opportunity
//! settlement.
//! CORS enabled for a separately hosted frontend.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, DashboardState};

/// Bind the port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server stopped");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/analyze", post(routes::trigger_analysis))
        .route("/api/status", get(routes::get_status))
        .route("/api/bot/start", post(routes::start_bot))
        .route("/api/bot/stop", post(routes::stop_bot))
        .route("/api/notify/test", post(routes::test_notification))
        .route("/api/opportunities", get(routes::get_opportunities))
        .route("/api/opportunities/:id/status", post(routes::settle_opportunity))
        .route("/api/analytics", get(routes::get_analytics))
        .route("/api/logs", get(routes::get_logs))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
