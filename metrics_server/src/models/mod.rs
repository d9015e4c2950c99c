//! Raw fact rows and derived metric rows.

pub mod deployment;
pub mod incident;
pub mod metrics;
pub mod pull_request;
