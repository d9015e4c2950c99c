//! Bulk loader: replaces the raw fact tables wholesale.
//!
//! All three tables are dropped, recreated, and repopulated inside one
//! transaction. A malformed source rolls the whole load back, so readers and
//! the aggregation engine see either the previous contents or the new ones.

use std::path::{Path, PathBuf};
use std::time::Instant;

use duckdb::{params, Connection, Transaction};

use crate::error::{StoreError, StoreResult};
use crate::models::deployment::Deployment;
use crate::models::incident::Incident;
use crate::models::pull_request::PullRequest;
use crate::schema::{TableDef, DEPLOYMENTS, INCIDENTS, PULL_REQUESTS, RAW_TABLES};
use crate::store::MetricsStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Where replacement rows come from.
#[derive(Debug, Clone)]
pub enum LoadSource {
    /// `deployments.csv`, `incidents.csv`, `pull_requests.csv` with headers,
    /// columns in table order.
    CsvDir(PathBuf),
    /// Typed rows held in memory.
    Batch(RawBatch),
}

impl LoadSource {
    fn describe(&self) -> String {
        match self {
            LoadSource::CsvDir(dir) => dir.display().to_string(),
            LoadSource::Batch(_) => "in-memory batch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub deployments: Vec<Deployment>,
    pub incidents: Vec<Incident>,
    pub pull_requests: Vec<PullRequest>,
}

/// Rows written per table by one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub deployments: usize,
    pub incidents: usize,
    pub pull_requests: usize,
}

/// Replace all raw tables from `source`.
pub async fn replace_all(store: &MetricsStore, source: LoadSource) -> StoreResult<LoadReport> {
    let started = Instant::now();
    let description = source.describe();

    let result = store
        .read(move |conn| replace_in_transaction(conn, &source))
        .await;

    match &result {
        Ok(report) => {
            crate::metrics::load_completed(started.elapsed().as_millis() as u64);
            tracing::info!(
                source = %description,
                deployments = report.deployments,
                incidents = report.incidents,
                pull_requests = report.pull_requests,
                "Raw data loaded"
            );
        }
        Err(e) => {
            crate::metrics::load_failed();
            tracing::warn!(source = %description, "Raw data load failed: {e}");
        }
    }

    result
}

fn replace_in_transaction(conn: &mut Connection, source: &LoadSource) -> StoreResult<LoadReport> {
    if let LoadSource::CsvDir(dir) = source {
        for table in RAW_TABLES {
            let path = csv_path(dir, table);
            if !path.is_file() {
                return Err(StoreError::InvalidInput(format!(
                    "missing source file {}",
                    path.display()
                )));
            }
        }
    }

    let tx = conn.transaction()?;

    for table in RAW_TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))?;
        tx.execute_batch(table.ddl)?;
    }

    let report = match source {
        LoadSource::CsvDir(dir) => LoadReport {
            deployments: insert_csv(&tx, dir, &DEPLOYMENTS)?,
            incidents: insert_csv(&tx, dir, &INCIDENTS)?,
            pull_requests: insert_csv(&tx, dir, &PULL_REQUESTS)?,
        },
        LoadSource::Batch(batch) => LoadReport {
            deployments: insert_deployments(&tx, &batch.deployments)?,
            incidents: insert_incidents(&tx, &batch.incidents)?,
            pull_requests: insert_pull_requests(&tx, &batch.pull_requests)?,
        },
    };

    tx.commit()?;
    Ok(report)
}

fn csv_path(dir: &Path, table: &TableDef) -> PathBuf {
    dir.join(format!("{}.csv", table.name))
}

fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

fn insert_csv(tx: &Transaction<'_>, dir: &Path, table: &TableDef) -> StoreResult<usize> {
    let path = csv_path(dir, table);
    // Table functions take a literal path; the directory comes from operator
    // configuration, never from a request.
    let sql = format!(
        "INSERT INTO {} SELECT * FROM read_csv_auto('{}', header = true)",
        table.name,
        escape_single_quotes(&path.display().to_string())
    );
    Ok(tx.execute(&sql, [])?)
}

fn insert_deployments(tx: &Transaction<'_>, rows: &[Deployment]) -> StoreResult<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO deployments VALUES (?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?)",
    )?;
    for d in rows {
        stmt.execute(params![
            d.deployment_id,
            d.team,
            d.service,
            d.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            d.duration_minutes,
            d.status,
            d.environment,
            d.commit_hash,
        ])?;
    }
    Ok(rows.len())
}

fn insert_incidents(tx: &Transaction<'_>, rows: &[Incident]) -> StoreResult<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO incidents VALUES \
         (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?)",
    )?;
    for i in rows {
        stmt.execute(params![
            i.incident_id,
            i.team,
            i.service,
            i.start_time.format(TIMESTAMP_FORMAT).to_string(),
            i.end_time.format(TIMESTAMP_FORMAT).to_string(),
            i.severity,
            i.resolved_by,
            i.root_cause,
        ])?;
    }
    Ok(rows.len())
}

fn insert_pull_requests(tx: &Transaction<'_>, rows: &[PullRequest]) -> StoreResult<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO pull_requests VALUES \
         (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?)",
    )?;
    for pr in rows {
        stmt.execute(params![
            pr.pr_id,
            pr.team,
            pr.author,
            pr.created_at.format(TIMESTAMP_FORMAT).to_string(),
            pr.merged_at
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            pr.lines_added,
            pr.lines_removed,
            pr.review_time_hours.map(f64::from),
            pr.status,
        ])?;
    }
    Ok(rows.len())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    pub fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, 0, 0).unwrap()
    }

    pub fn deployment(
        id: &str,
        team: &str,
        timestamp: NaiveDateTime,
        duration_minutes: i32,
        status: &str,
    ) -> Deployment {
        Deployment {
            deployment_id: id.to_string(),
            team: team.to_string(),
            service: format!("{team}-api"),
            timestamp,
            duration_minutes,
            status: status.to_string(),
            environment: "production".to_string(),
            commit_hash: format!("{id}-sha"),
        }
    }

    pub fn batch(deployments: Vec<Deployment>) -> RawBatch {
        RawBatch {
            deployments,
            ..RawBatch::default()
        }
    }

    pub async fn seeded_store(deployments: Vec<Deployment>) -> MetricsStore {
        let store = MetricsStore::open_in_memory(crate::store::StoreOptions::default()).unwrap();
        crate::schema::initialize(&store).await.unwrap();
        replace_all(&store, LoadSource::Batch(batch(deployments)))
            .await
            .unwrap();
        store
    }
}
