//! Deployment metrics service.
//!
//! Raw deployment, incident and pull-request facts live in an embedded DuckDB
//! file. A background scheduler periodically rebuilds per-day and per-team
//! rollup tables, and a small read-only HTTP API serves team leaderboards and
//! daily trends.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;
