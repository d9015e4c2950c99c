//! Reads of the materialized rollup tables written by the aggregation engine.
//!
//! Results are as fresh as the last successful aggregation run.

use chrono::{NaiveDate, Utc};
use duckdb::params_from_iter;

use super::{team_filter, timed, DayWindow};
use crate::error::StoreResult;
use crate::models::metrics::{DailySummary, TeamRanking};
use crate::store::MetricsStore;

pub async fn query_daily_summary(
    store: &MetricsStore,
    team: Option<&str>,
    window: DayWindow,
) -> StoreResult<Vec<DailySummary>> {
    query_daily_summary_as_of(store, team, window, Utc::now().date_naive()).await
}

pub(crate) async fn query_daily_summary_as_of(
    store: &MetricsStore,
    team: Option<&str>,
    window: DayWindow,
    today: NaiveDate,
) -> StoreResult<Vec<DailySummary>> {
    if window.is_empty() {
        return Ok(Vec::new());
    }

    let team = team_filter(team);
    let mut sql = String::from(
        "SELECT CAST(date AS VARCHAR), team, total_deployments, \
                successful_deployments, avg_duration_minutes \
         FROM daily_team_summary \
         WHERE date >= CAST(? AS DATE)",
    );
    let mut params = vec![window.cutoff(today).format("%Y-%m-%d").to_string()];
    if let Some(team) = team {
        sql.push_str(" AND team = ?");
        params.push(team);
    }
    sql.push_str(" ORDER BY date DESC, team");

    timed(
        "daily_summary",
        store.read(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    Ok(DailySummary {
                        date: row.get(0)?,
                        team: row.get(1)?,
                        total_deployments: row.get(2)?,
                        successful_deployments: row.get(3)?,
                        avg_duration_minutes: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }),
    )
    .await
}

pub async fn query_team_rankings(store: &MetricsStore) -> StoreResult<Vec<TeamRanking>> {
    timed(
        "team_rankings",
        store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT team, total_deployments, success_rate_pct, success_rank, velocity_rank \
                 FROM team_rankings \
                 ORDER BY success_rank, velocity_rank, team",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TeamRanking {
                        team: row.get(0)?,
                        total_deployments: row.get(1)?,
                        success_rate_pct: row.get(2)?,
                        success_rank: row.get(3)?,
                        velocity_rank: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }),
    )
    .await
}
