//! End-to-end checks of the HTTP API against an in-memory store.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use deploy_metrics::models::deployment::Deployment;
use deploy_metrics::routes::{metrics_router, MetricsRouterState};
use deploy_metrics::schema;
use deploy_metrics::services::aggregation_service::{AggregationEngine, AggregationOutcome};
use deploy_metrics::services::load_service::{replace_all, LoadSource, RawBatch};
use deploy_metrics::store::{MetricsStore, StoreOptions};

fn today_at(hour: u32) -> NaiveDateTime {
    Utc::now().date_naive().and_hms_opt(hour, 0, 0).unwrap()
}

fn deployment(id: &str, team: &str, duration_minutes: i32, status: &str) -> Deployment {
    Deployment {
        deployment_id: id.to_string(),
        team: team.to_string(),
        service: "checkout".to_string(),
        timestamp: today_at(0),
        duration_minutes,
        status: status.to_string(),
        environment: "production".to_string(),
        commit_hash: format!("{id}0000"),
    }
}

async fn seeded() -> (MetricsStore, Router) {
    let store = MetricsStore::open_in_memory(StoreOptions::default()).unwrap();
    schema::initialize(&store).await.unwrap();
    replace_all(
        &store,
        LoadSource::Batch(RawBatch {
            deployments: vec![
                deployment("a1", "alpha", 10, "success"),
                deployment("a2", "alpha", 20, "success"),
                deployment("a3", "alpha", 30, "failed"),
                deployment("b1", "beta", 5, "success"),
                deployment("g1", "gamma", 8, "failed"),
            ],
            ..RawBatch::default()
        }),
    )
    .await
    .unwrap();

    let router = metrics_router(MetricsRouterState {
        store: store.clone(),
    });
    (store, router)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_store_kind() {
    let (_store, router) = seeded().await;
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "duckdb");
}

#[tokio::test]
async fn teams_endpoint_orders_by_success_rate() {
    let (_store, router) = seeded().await;
    let (status, body) = get(&router, "/api/v1/metrics/teams").await;
    assert_eq!(status, StatusCode::OK);

    let teams = body.as_array().unwrap();
    let names: Vec<_> = teams.iter().map(|t| t["team"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["beta", "alpha", "gamma"]);

    assert_eq!(teams[1]["total_deployments"], 3);
    assert_eq!(teams[1]["successful_deployments"], 2);
    assert_eq!(teams[1]["successful_rate_pct"], 66.67);
    assert_eq!(teams[1]["avg_duration_minutes"], 15.0);
    assert!(teams[2]["avg_duration_minutes"].is_null());
}

#[tokio::test]
async fn daily_endpoint_applies_team_and_window() {
    let (_store, router) = seeded().await;

    let (status, body) = get(&router, "/api/v1/metrics/daily?team=alpha&days=7").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["team"], "alpha");
    assert_eq!(rows[0]["deployments"], 3);
    assert_eq!(rows[0]["successful"], 2);
    assert_eq!(rows[0]["avg_duration"], 20.0);

    let (_, all) = get(&router, "/api/v1/metrics/daily?team=").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (status, fallback) = get(&router, "/api/v1/metrics/daily?days=lots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fallback.as_array().unwrap().len(), 3);

    let (status, none) = get(&router, "/api/v1/metrics/daily?days=0").await;
    assert_eq!(status, StatusCode::OK);
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_endpoints_follow_aggregation() {
    let (store, router) = seeded().await;

    let (_, before) = get(&router, "/api/v1/metrics/rankings").await;
    assert!(before.as_array().unwrap().is_empty());

    let engine = AggregationEngine::new(store, Duration::from_secs(30));
    assert!(matches!(
        engine.run_once().await.unwrap(),
        AggregationOutcome::Completed(_)
    ));

    let (status, rankings) = get(&router, "/api/v1/metrics/rankings").await;
    assert_eq!(status, StatusCode::OK);
    let rankings = rankings.as_array().unwrap();
    assert_eq!(rankings.len(), 3);
    assert_eq!(rankings[0]["team"], "beta");
    assert_eq!(rankings[0]["success_rank"], 1);

    let (status, summary) = get(&router, "/api/v1/metrics/summary?team=alpha").await;
    assert_eq!(status, StatusCode::OK);
    let summary = summary.as_array().unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0]["total_deployments"], 3);
}

#[tokio::test]
async fn query_failure_is_a_500_with_message() {
    let (store, router) = seeded().await;
    store.close().await.unwrap();

    let (status, body) = get(&router, "/api/v1/metrics/teams").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("query failed"));

    let (status, _) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
}
