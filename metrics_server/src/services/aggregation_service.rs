//! Aggregation engine: rebuilds the materialized rollup tables.
//!
//! Each run replaces `daily_team_summary` and `team_rankings` with
//! `CREATE OR REPLACE TABLE ... AS` inside one transaction. A failed run
//! rolls back and the previous snapshot stays readable. Runs never overlap:
//! a run that finds the engine busy returns [`AggregationOutcome::Skipped`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use duckdb::Connection;
use tokio::sync::Mutex;

use crate::error::StoreResult;
use crate::store::MetricsStore;

const DAILY_SUMMARY_SQL: &str = r#"
CREATE OR REPLACE TABLE daily_team_summary AS
SELECT
    CAST(DATE_TRUNC('day', timestamp) AS DATE) AS date,
    team,
    COUNT(*) AS total_deployments,
    COUNT(*) FILTER (WHERE status = 'success') AS successful_deployments,
    CAST(ROUND(AVG(duration_minutes), 2) AS DOUBLE) AS avg_duration_minutes
FROM deployments
GROUP BY CAST(DATE_TRUNC('day', timestamp) AS DATE), team
ORDER BY date, team
"#;

const TEAM_RANKINGS_SQL: &str = r#"
CREATE OR REPLACE TABLE team_rankings AS
WITH per_team AS (
    SELECT
        team,
        COUNT(*) AS total_deployments,
        CAST(COUNT(*) FILTER (WHERE status = 'success') AS DOUBLE) * 100.0
            / COUNT(*) AS success_rate
    FROM deployments
    GROUP BY team
)
SELECT
    team,
    total_deployments,
    CAST(ROUND(success_rate, 2) AS DOUBLE) AS success_rate_pct,
    DENSE_RANK() OVER (ORDER BY success_rate DESC) AS success_rank,
    DENSE_RANK() OVER (ORDER BY total_deployments DESC) AS velocity_rank
FROM per_team
ORDER BY success_rank, velocity_rank, team
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationReport {
    pub summary_rows: i64,
    pub ranked_teams: i64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationOutcome {
    Completed(AggregationReport),
    /// Another run held the guard; this invocation did nothing.
    Skipped,
}

#[derive(Clone)]
pub struct AggregationEngine {
    store: MetricsStore,
    running: Arc<Mutex<()>>,
    timeout: Duration,
}

impl AggregationEngine {
    pub fn new(store: MetricsStore, timeout: Duration) -> Self {
        Self {
            store,
            running: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Rebuild both snapshot tables once.
    ///
    /// The guard moves into the blocking task, so after a timeout it is still
    /// held until the statements return. A timed out run is not cancelled: its
    /// transaction may still commit and replace the snapshot afterwards.
    pub async fn run_once(&self) -> StoreResult<AggregationOutcome> {
        let Ok(guard) = self.running.clone().try_lock_owned() else {
            crate::metrics::aggregation_skipped();
            return Ok(AggregationOutcome::Skipped);
        };

        let started = Instant::now();
        let (summary_rows, ranked_teams) = self
            .store
            .run(self.timeout, move |conn| {
                let _guard = guard;
                rebuild_snapshot(conn)
            })
            .await?;

        Ok(AggregationOutcome::Completed(AggregationReport {
            summary_rows,
            ranked_teams,
            elapsed: started.elapsed(),
        }))
    }

    /// Scheduler entry point: failures are logged and absorbed.
    pub async fn run_logged(&self) {
        tracing::info!("Running metrics aggregation...");

        match self.run_once().await {
            Ok(AggregationOutcome::Completed(report)) => {
                crate::metrics::aggregation_completed(report.elapsed.as_millis() as u64);
                tracing::info!(
                    summary_rows = report.summary_rows,
                    ranked_teams = report.ranked_teams,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Metrics aggregation completed"
                );
            }
            Ok(AggregationOutcome::Skipped) => {
                tracing::warn!("Previous aggregation still running, tick dropped");
            }
            Err(e) if e.is_retryable() => {
                crate::metrics::aggregation_failed(true);
                tracing::warn!(
                    retryable = true,
                    "Aggregation {e}; the run continues in the background and \
                     the snapshot may still be replaced when it finishes"
                );
            }
            Err(e) => {
                crate::metrics::aggregation_failed(false);
                tracing::error!(
                    retryable = false,
                    "Aggregation failed, keeping previous snapshot: {e}"
                );
            }
        }
    }
}

fn rebuild_snapshot(conn: &mut Connection) -> StoreResult<(i64, i64)> {
    let tx = conn.transaction()?;

    tx.execute_batch(DAILY_SUMMARY_SQL)?;
    tx.execute_batch(TEAM_RANKINGS_SQL)?;

    let summary_rows: i64 =
        tx.query_row("SELECT COUNT(*) FROM daily_team_summary", [], |row| row.get(0))?;
    let ranked_teams: i64 =
        tx.query_row("SELECT COUNT(*) FROM team_rankings", [], |row| row.get(0))?;

    tx.commit()?;
    Ok((summary_rows, ranked_teams))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::load_service::fixtures::*;

    type Row = (String, String, i64, i64, f64);
    type RankRow = (String, i64, f64, i64, i64);

    async fn summary_rows(store: &MetricsStore) -> Vec<Row> {
        store
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT CAST(date AS VARCHAR), team, total_deployments, \
                     successful_deployments, avg_duration_minutes FROM daily_team_summary",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .unwrap()
    }

    async fn ranking_rows(store: &MetricsStore) -> Vec<RankRow> {
        store
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT team, total_deployments, success_rate_pct, success_rank, \
                     velocity_rank FROM team_rankings",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .unwrap()
    }

    fn completed(outcome: AggregationOutcome) -> AggregationReport {
        match outcome {
            AggregationOutcome::Completed(report) => report,
            AggregationOutcome::Skipped => panic!("expected a completed run"),
        }
    }

    fn sample() -> Vec<crate::models::deployment::Deployment> {
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        vec![
            deployment("a1", "alpha", at(d1, 9), 10, "success"),
            deployment("a2", "alpha", at(d1, 15), 20, "success"),
            deployment("b1", "beta", at(d1, 11), 5, "success"),
            deployment("c1", "gamma", at(d1, 12), 30, "failed"),
            deployment("c2", "gamma", at(d2, 12), 40, "success"),
        ]
    }

    #[tokio::test]
    async fn builds_daily_summary_and_dense_rankings() {
        let store = seeded_store(sample()).await;
        let engine = AggregationEngine::new(store.clone(), Duration::from_secs(30));

        let report = completed(engine.run_once().await.unwrap());
        assert_eq!(report.summary_rows, 4);
        assert_eq!(report.ranked_teams, 3);

        let summary = summary_rows(&store).await;
        assert_eq!(
            summary[0],
            ("2024-05-01".to_string(), "alpha".to_string(), 2, 2, 15.0)
        );
        assert_eq!(
            summary[2],
            ("2024-05-01".to_string(), "gamma".to_string(), 1, 0, 30.0)
        );

        // alpha 100% x2, beta 100% x1, gamma 50% x2
        let rankings = ranking_rows(&store).await;
        assert_eq!(
            rankings,
            vec![
                ("alpha".to_string(), 2, 100.0, 1, 1),
                ("beta".to_string(), 1, 100.0, 1, 2),
                ("gamma".to_string(), 2, 50.0, 2, 1),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_runs_produce_identical_tables() {
        let store = seeded_store(sample()).await;
        let engine = AggregationEngine::new(store.clone(), Duration::from_secs(30));

        completed(engine.run_once().await.unwrap());
        let first = (summary_rows(&store).await, ranking_rows(&store).await);

        completed(engine.run_once().await.unwrap());
        let second = (summary_rows(&store).await, ranking_rows(&store).await);

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn busy_engine_skips_instead_of_queueing() {
        let store = seeded_store(sample()).await;
        let engine = AggregationEngine::new(store, Duration::from_secs(30));

        let held = engine.running.clone().try_lock_owned().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.run_once().await.unwrap(), AggregationOutcome::Skipped);

        drop(held);
        assert!(!engine.is_running());
        completed(engine.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn failed_run_keeps_previous_snapshot() {
        let store = seeded_store(sample()).await;
        let engine = AggregationEngine::new(store.clone(), Duration::from_secs(30));
        completed(engine.run_once().await.unwrap());
        let before = (summary_rows(&store).await, ranking_rows(&store).await);

        // A raw table whose duration column no longer averages.
        store
            .read(|conn| {
                conn.execute_batch(
                    "CREATE OR REPLACE TABLE deployments AS SELECT \
                     'z1' AS deployment_id, 'zeta' AS team, 'svc' AS service, \
                     TIMESTAMP '2024-05-03 10:00:00' AS timestamp, \
                     'slow' AS duration_minutes, 'success' AS status, \
                     'prod' AS environment, 'abc' AS commit_hash",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(engine.run_once().await.is_err());
        assert!(!engine.is_running());

        let after = (summary_rows(&store).await, ranking_rows(&store).await);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn timed_out_run_may_still_commit() {
        let store = seeded_store(sample()).await;
        let engine = AggregationEngine::new(store.clone(), Duration::ZERO);

        let err = engine.run_once().await.unwrap_err();
        assert!(err.is_retryable());

        let mut finished = false;
        for _ in 0..100 {
            if !engine.is_running() {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(finished, "timed out run should release the guard when done");

        // Nothing cancelled the transaction, so its result landed.
        assert_eq!(summary_rows(&store).await.len(), 4);
        assert_eq!(ranking_rows(&store).await.len(), 3);
    }
}
