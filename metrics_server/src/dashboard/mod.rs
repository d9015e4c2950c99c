//! Read-only metric queries: live rollups over raw facts (`kpi`) and reads of
//! the materialized snapshot tables (`snapshot`).

pub mod kpi;
pub mod snapshot;

use std::future::Future;
use std::time::Instant;

use chrono::{Days, NaiveDate};

use crate::error::StoreResult;

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 3650;

/// Validated trailing window, in whole days back from today.
///
/// "Today" is the UTC calendar date of the service clock, not the store's
/// `CURRENT_DATE`, so the window does not move with DuckDB's `TimeZone`
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow(u32);

impl DayWindow {
    /// Clamp to `0..=MAX_DAYS`.
    pub fn new(days: i64) -> Self {
        Self(days.clamp(0, MAX_DAYS as i64) as u32)
    }

    /// Parse a query-string value. Absent or non-numeric input falls back to
    /// [`DEFAULT_DAYS`]. Surrounding whitespace is ignored, so `" 7 "` is a
    /// seven day window rather than the default.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
            Some(days) => Self::new(days),
            None => Self(DEFAULT_DAYS),
        }
    }

    pub fn days(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// First day included in the window.
    pub fn cutoff(self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.0)))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Default for DayWindow {
    fn default() -> Self {
        Self(DEFAULT_DAYS)
    }
}

/// `None` and `""` both mean "all teams". Any other value is matched exactly.
pub(crate) fn team_filter(team: Option<&str>) -> Option<String> {
    team.filter(|t| !t.is_empty()).map(str::to_string)
}

pub(crate) async fn timed<T, F>(query: &'static str, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    let started = Instant::now();
    let result = fut.await;
    crate::metrics::query_executed(query, started.elapsed().as_millis() as u64, result.is_ok());
    if let Err(e) = &result {
        tracing::error!(query, "Metrics query failed: {e}");
    }
    result
}
