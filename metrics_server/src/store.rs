//! Embedded DuckDB store handle.
//!
//! One `MetricsStore` is opened by `main` and cloned into the router state and
//! the aggregation scheduler. Every operation runs on its own connection
//! cloned from the root handle, on tokio's blocking pool, so readers never
//! wait on each other or on an aggregation run inside this process. The root
//! mutex is only held while cloning.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use duckdb::Connection;
use tokio::sync::Semaphore;

use crate::config::MetricsConfig;
use crate::error::{StoreError, StoreResult};

/// Reported by the health endpoint.
pub const STORE_KIND: &str = "duckdb";

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_concurrent: usize,
    pub query_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&MetricsConfig> for StoreOptions {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_queries,
            query_timeout: config.query_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct MetricsStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    root: Mutex<Option<Connection>>,
    location: String,
    permits: Arc<Semaphore>,
    capacity: u32,
    query_timeout: Duration,
}

impl MetricsStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &Path, options: StoreOptions) -> StoreResult<Self> {
        tracing::info!(path = %path.display(), "Opening DuckDB store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Ok(Self::from_connection(
            conn,
            path.display().to_string(),
            options,
        ))
    }

    /// Open a private in-memory store (tests, dry runs).
    pub fn open_in_memory(options: StoreOptions) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, ":memory:".to_string(), options))
    }

    fn from_connection(conn: Connection, location: String, options: StoreOptions) -> Self {
        let capacity = options.max_concurrent.clamp(1, u32::MAX as usize);
        Self {
            inner: Arc::new(StoreInner {
                root: Mutex::new(Some(conn)),
                location,
                permits: Arc::new(Semaphore::new(capacity)),
                capacity: capacity as u32,
                query_timeout: options.query_timeout,
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        STORE_KIND
    }

    pub fn location(&self) -> &str {
        &self.inner.location
    }

    fn connect(&self) -> StoreResult<Connection> {
        let root = self
            .inner
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match root.as_ref() {
            Some(conn) => Ok(conn.try_clone()?),
            None => Err(StoreError::Closed),
        }
    }

    /// Run `op` with the default query timeout.
    pub async fn read<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(self.inner.query_timeout, op).await
    }

    /// Run `op` on a fresh connection on the blocking pool.
    ///
    /// The concurrency permit travels with the blocking closure, so a timed
    /// out operation keeps its slot until the statement actually returns.
    pub async fn run<T, F>(&self, timeout: Duration, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Closed)?;
        let mut conn = self.connect()?;

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            op(&mut conn)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }

    /// Wait for in-flight operations, then close the root connection.
    /// Further operations fail with [`StoreError::Closed`].
    pub async fn close(&self) -> StoreResult<()> {
        // Cloned connections share the root's database handle.
        if let Ok(all) = self.inner.permits.acquire_many(self.inner.capacity).await {
            all.forget();
        }
        self.inner.permits.close();

        let conn = self
            .inner
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            tracing::info!(location = %self.inner.location, "DuckDB store closed");
        }
        Ok(())
    }
}
