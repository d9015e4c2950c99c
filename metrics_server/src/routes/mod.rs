//! HTTP routes: read-only metrics API and health check.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::dashboard::{kpi, snapshot, DayWindow};
use crate::error::StoreError;
use crate::models::metrics::{DailyMetrics, DailySummary, TeamMetrics, TeamRanking};
use crate::store::MetricsStore;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct MetricsRouterState {
    pub store: MetricsStore,
}

/// Build the metrics API router.
pub fn metrics_router(state: MetricsRouterState) -> Router {
    Router::new()
        // Live KPIs
        .route("/api/v1/metrics/teams", get(team_metrics))
        .route("/api/v1/metrics/daily", get(daily_metrics))
        // Materialized snapshot
        .route("/api/v1/metrics/summary", get(daily_summary))
        .route("/api/v1/metrics/rankings", get(team_rankings))
        .route("/health", get(health))
        .with_state(state)
}

/// Router plus request logging, timeout and CORS layers.
pub fn app(state: MetricsRouterState, request_timeout: Duration) -> Router {
    metrics_router(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// A query failure, reported as 500 with `{"error": ...}`.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("query failed: {}", self.0) })),
        )
            .into_response()
    }
}

/// `days` stays a string so bad input falls back to the default window
/// instead of being rejected by the extractor.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WindowQuery {
    pub team: Option<String>,
    pub days: Option<String>,
}

impl WindowQuery {
    fn window(&self) -> DayWindow {
        DayWindow::from_query(self.days.as_deref())
    }
}

// ── Live KPIs ──

async fn team_metrics(
    State(state): State<MetricsRouterState>,
) -> Result<Json<Vec<TeamMetrics>>, ApiError> {
    Ok(Json(kpi::query_team_metrics(&state.store).await?))
}

async fn daily_metrics(
    State(state): State<MetricsRouterState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<DailyMetrics>>, ApiError> {
    let metrics =
        kpi::query_daily_metrics(&state.store, query.team.as_deref(), query.window()).await?;
    Ok(Json(metrics))
}

// ── Snapshot ──

async fn daily_summary(
    State(state): State<MetricsRouterState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    let rows =
        snapshot::query_daily_summary(&state.store, query.team.as_deref(), query.window())
            .await?;
    Ok(Json(rows))
}

async fn team_rankings(
    State(state): State<MetricsRouterState>,
) -> Result<Json<Vec<TeamRanking>>, ApiError> {
    Ok(Json(snapshot::query_team_rankings(&state.store).await?))
}

// ── Health ──

async fn health(State(state): State<MetricsRouterState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "database": state.store.kind() }))
}
