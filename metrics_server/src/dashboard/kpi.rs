//! Live KPI queries over the raw `deployments` table.

use chrono::{NaiveDate, Utc};
use duckdb::params_from_iter;

use super::{team_filter, timed, DayWindow};
use crate::error::StoreResult;
use crate::models::metrics::{DailyMetrics, TeamMetrics};
use crate::store::MetricsStore;

const TEAM_METRICS_SQL: &str = "\
SELECT \
    team, \
    COUNT(*) AS total_deployments, \
    COUNT(*) FILTER (WHERE status = 'success') AS successful_deployments, \
    ROUND(CAST(COUNT(*) FILTER (WHERE status = 'success') AS DOUBLE) * 100.0 / COUNT(*), 2) AS success_rate, \
    ROUND(CAST(AVG(duration_minutes) FILTER (WHERE status = 'success') AS DOUBLE), 2) AS avg_duration, \
    ROUND(CAST(COUNT(*) AS DOUBLE) / 7, 2) AS deployments_per_day \
FROM deployments \
GROUP BY team \
ORDER BY success_rate DESC, team";

/// Per-team leaderboard, best success rate first.
///
/// Only teams with at least one deployment appear. `deployments_per_day` is
/// always total / 7.
pub async fn query_team_metrics(store: &MetricsStore) -> StoreResult<Vec<TeamMetrics>> {
    timed(
        "team_metrics",
        store.read(|conn| {
            let mut stmt = conn.prepare(TEAM_METRICS_SQL)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TeamMetrics {
                        team: row.get(0)?,
                        total_deployments: row.get(1)?,
                        successful_deployments: row.get(2)?,
                        success_rate: row.get(3)?,
                        avg_duration_minutes: row.get(4)?,
                        deployments_per_day: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }),
    )
    .await
}

/// Daily rollup over the trailing window, newest day first, then team.
pub async fn query_daily_metrics(
    store: &MetricsStore,
    team: Option<&str>,
    window: DayWindow,
) -> StoreResult<Vec<DailyMetrics>> {
    query_daily_metrics_as_of(store, team, window, Utc::now().date_naive()).await
}

pub(crate) async fn query_daily_metrics_as_of(
    store: &MetricsStore,
    team: Option<&str>,
    window: DayWindow,
    today: NaiveDate,
) -> StoreResult<Vec<DailyMetrics>> {
    if window.is_empty() {
        return Ok(Vec::new());
    }

    let team = team_filter(team);
    let mut sql = String::from(
        "SELECT \
            CAST(CAST(timestamp AS DATE) AS VARCHAR) AS date, \
            team, \
            COUNT(*) AS deployments, \
            COUNT(*) FILTER (WHERE status = 'success') AS successful, \
            ROUND(CAST(AVG(duration_minutes) AS DOUBLE), 2) AS avg_duration \
         FROM deployments \
         WHERE timestamp >= CAST(? AS DATE)",
    );
    let mut params = vec![window.cutoff(today).format("%Y-%m-%d").to_string()];
    if let Some(team) = team {
        sql.push_str(" AND team = ?");
        params.push(team);
    }
    sql.push_str(" GROUP BY 1, 2 ORDER BY date DESC, team");

    timed(
        "daily_metrics",
        store.read(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    Ok(DailyMetrics {
                        date: row.get(0)?,
                        team: row.get(1)?,
                        deployments: row.get(2)?,
                        successful: row.get(3)?,
                        avg_duration: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }),
    )
    .await
}
