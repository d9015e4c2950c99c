//! Derived rows returned by the query service.

use serde::Serialize;

/// Per-team leaderboard entry, computed live from `deployments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMetrics {
    pub team: String,
    pub total_deployments: i64,
    pub successful_deployments: i64,
    #[serde(rename = "successful_rate_pct")]
    pub success_rate: f64,
    /// `None` when the team has no successful deployment.
    pub avg_duration_minutes: Option<f64>,
    /// Total divided by a constant 7, not by the number of observed days.
    pub deployments_per_day: f64,
}

/// One team's deployments on one calendar day, computed live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMetrics {
    /// `YYYY-MM-DD`
    pub date: String,
    pub team: String,
    pub deployments: i64,
    pub successful: i64,
    /// Averaged over all deployments that day, failures included.
    pub avg_duration: f64,
}

/// Row of the materialized `daily_team_summary` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub team: String,
    pub total_deployments: i64,
    pub successful_deployments: i64,
    pub avg_duration_minutes: f64,
}

/// Row of the materialized `team_rankings` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRanking {
    pub team: String,
    pub total_deployments: i64,
    pub success_rate_pct: f64,
    pub success_rank: i64,
    pub velocity_rank: i64,
}
