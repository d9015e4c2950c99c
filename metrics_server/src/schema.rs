//! DuckDB table definitions.
//!
//! Raw fact tables: deployments, incidents, pull_requests.
//! Materialized tables: daily_team_summary, team_rankings (replaced on every
//! aggregation run, created empty here so snapshot reads work before the
//! first run).

use duckdb::Connection;

use crate::error::StoreResult;
use crate::store::MetricsStore;

pub struct TableDef {
    pub name: &'static str,
    pub ddl: &'static str,
}

pub const DEPLOYMENTS: TableDef = TableDef {
    name: "deployments",
    ddl: r#"
CREATE TABLE IF NOT EXISTS deployments (
    deployment_id       VARCHAR PRIMARY KEY,
    team                VARCHAR NOT NULL,
    service             VARCHAR NOT NULL,
    timestamp           TIMESTAMP NOT NULL,
    duration_minutes    INTEGER NOT NULL,
    status              VARCHAR NOT NULL,
    environment         VARCHAR NOT NULL,
    commit_hash         VARCHAR NOT NULL
)"#,
};

pub const INCIDENTS: TableDef = TableDef {
    name: "incidents",
    ddl: r#"
CREATE TABLE IF NOT EXISTS incidents (
    incident_id         VARCHAR PRIMARY KEY,
    team                VARCHAR NOT NULL,
    service             VARCHAR NOT NULL,
    start_time          TIMESTAMP NOT NULL,
    end_time            TIMESTAMP NOT NULL,
    severity            VARCHAR NOT NULL,
    resolved_by         VARCHAR,
    root_cause          VARCHAR
)"#,
};

pub const PULL_REQUESTS: TableDef = TableDef {
    name: "pull_requests",
    ddl: r#"
CREATE TABLE IF NOT EXISTS pull_requests (
    pr_id               VARCHAR PRIMARY KEY,
    team                VARCHAR NOT NULL,
    author              VARCHAR NOT NULL,
    created_at          TIMESTAMP NOT NULL,
    merged_at           TIMESTAMP,
    lines_added         INTEGER,
    lines_removed       INTEGER,
    review_time_hours   FLOAT,
    status              VARCHAR NOT NULL
)"#,
};

pub const DAILY_TEAM_SUMMARY: TableDef = TableDef {
    name: "daily_team_summary",
    ddl: r#"
CREATE TABLE IF NOT EXISTS daily_team_summary (
    date                    DATE,
    team                    VARCHAR,
    total_deployments       BIGINT,
    successful_deployments  BIGINT,
    avg_duration_minutes    DOUBLE
)"#,
};

pub const TEAM_RANKINGS: TableDef = TableDef {
    name: "team_rankings",
    ddl: r#"
CREATE TABLE IF NOT EXISTS team_rankings (
    team                VARCHAR,
    total_deployments   BIGINT,
    success_rate_pct    DOUBLE,
    success_rank        BIGINT,
    velocity_rank       BIGINT
)"#,
};

pub const RAW_TABLES: [&TableDef; 3] = [&DEPLOYMENTS, &INCIDENTS, &PULL_REQUESTS];

pub const DERIVED_TABLES: [&TableDef; 2] = [&DAILY_TEAM_SUMMARY, &TEAM_RANKINGS];

/// Create every table that does not exist yet. Never touches data.
pub fn create_tables(conn: &Connection) -> StoreResult<()> {
    for table in RAW_TABLES.iter().chain(DERIVED_TABLES.iter()) {
        conn.execute_batch(table.ddl)?;
        tracing::debug!(table = table.name, "Ensured table");
    }
    Ok(())
}

/// Startup entry point. A failure here is fatal to the service.
pub async fn initialize(store: &MetricsStore) -> StoreResult<()> {
    store.read(|conn| create_tables(conn)).await?;
    tracing::info!(
        raw = RAW_TABLES.len(),
        derived = DERIVED_TABLES.len(),
        "Schema initialized"
    );
    Ok(())
}

#[cfg(test)]
pub(crate) fn table_names(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'main' ORDER BY table_name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
