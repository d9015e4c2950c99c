//! Service tuning configuration, loaded from environment variables.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Seconds between scheduled aggregation runs.
    pub aggregation_interval_secs: u64,
    /// Run one aggregation immediately at startup.
    pub aggregate_on_startup: bool,
    /// Upper bound on a single aggregation run.
    pub aggregation_timeout_secs: u64,
    /// Upper bound on a single read query.
    pub query_timeout_secs: u64,
    /// Maximum store operations executing at once.
    pub max_concurrent_queries: usize,
    /// Upper bound on a whole HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            aggregation_interval_secs: 3600,
            aggregate_on_startup: true,
            aggregation_timeout_secs: 300,
            query_timeout_secs: 30,
            max_concurrent_queries: 8,
            request_timeout_secs: 60,
        }
    }
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let aggregation_interval_secs = env_parse("METRICS_AGGREGATION_INTERVAL_SECS")
            .unwrap_or(defaults.aggregation_interval_secs);
        let aggregate_on_startup = env_parse("METRICS_AGGREGATE_ON_STARTUP")
            .unwrap_or(defaults.aggregate_on_startup);
        let aggregation_timeout_secs = env_parse("METRICS_AGGREGATION_TIMEOUT_SECS")
            .unwrap_or(defaults.aggregation_timeout_secs);
        let query_timeout_secs =
            env_parse("METRICS_QUERY_TIMEOUT_SECS").unwrap_or(defaults.query_timeout_secs);
        let max_concurrent_queries = env_parse("METRICS_MAX_CONCURRENT_QUERIES")
            .unwrap_or(defaults.max_concurrent_queries);
        let request_timeout_secs =
            env_parse("METRICS_REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout_secs);

        if aggregation_interval_secs == 0 {
            tracing::warn!("METRICS_AGGREGATION_INTERVAL_SECS is 0 -- using 1 second");
        }
        if max_concurrent_queries == 0 {
            tracing::warn!("METRICS_MAX_CONCURRENT_QUERIES is 0 -- using 1");
        }

        Self {
            aggregation_interval_secs: aggregation_interval_secs.max(1),
            aggregate_on_startup,
            aggregation_timeout_secs,
            query_timeout_secs,
            max_concurrent_queries: max_concurrent_queries.max(1),
            request_timeout_secs,
        }
    }

    pub fn aggregation_interval(&self) -> Duration {
        Duration::from_secs(self.aggregation_interval_secs)
    }

    pub fn aggregation_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregation_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_hourly() {
        let config = MetricsConfig::default();
        assert_eq!(config.aggregation_interval(), Duration::from_secs(3600));
        assert!(config.aggregate_on_startup);
        assert_eq!(config.max_concurrent_queries, 8);
    }
}
