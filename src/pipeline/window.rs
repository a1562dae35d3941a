//! Windowed catalog queries
//!
//! Every query against a target is split in two: items published within the
//! last `offset_days`, and items whose publish date is unset or garbage (those
//! sort before the 1900-01-01 sentinel). Without the second window undated
//! items would never be processed.

use std::fmt;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ErrorKind, PipelineError, PipelineResult, with_timeout};
use crate::pipeline::types::{CatalogItem, ServerTarget};
use crate::services::media_server::MediaServer;

/// Which side of the boundary a window selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowMode {
    /// Published on or after the boundary
    MinDate,
    /// Published on or before the boundary
    MaxDate,
}

/// A `(mode, boundary)` pair sent as a catalog filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub mode: WindowMode,
    pub boundary: NaiveDate,
}

impl TimeWindow {
    /// Items published on or after `today - offset_days`
    pub fn recent(today: NaiveDate, offset_days: u32) -> Self {
        let boundary = today
            .checked_sub_days(Days::new(u64::from(offset_days)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            mode: WindowMode::MinDate,
            boundary,
        }
    }

    /// Fallback bucket for items without a usable publish date
    pub fn undated() -> Self {
        Self {
            mode: WindowMode::MaxDate,
            boundary: undated_sentinel(),
        }
    }

    /// Boundary formatted the way catalog filters expect it
    pub fn boundary_param(&self) -> String {
        self.boundary.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            WindowMode::MinDate => write!(f, "since {}", self.boundary_param()),
            WindowMode::MaxDate => write!(f, "until {}", self.boundary_param()),
        }
    }
}

/// Fixed early date standing in for "no date"
pub fn undated_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Both windows a run issues per target, dated window first
pub fn windows_for(today: NaiveDate, offset_days: u32) -> [TimeWindow; 2] {
    [TimeWindow::recent(today, offset_days), TimeWindow::undated()]
}

/// Parameters for one catalog request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogQuery {
    pub window: TimeWindow,
    /// Ask the server to include file paths in the response
    pub include_path: bool,
}

/// Items gathered from both windows of one target
#[derive(Debug, Default)]
pub struct WindowResult {
    /// Concatenation of both windows; duplicates are kept
    pub items: Vec<CatalogItem>,
    /// Set when at least one sub-query failed at transport level
    pub server_error: Option<ErrorKind>,
    pub failed_windows: Vec<TimeWindow>,
}

/// Runs the two-window query against a target
#[derive(Debug, Clone)]
pub struct WindowQuery {
    timeout: Duration,
    include_path: bool,
}

impl WindowQuery {
    pub fn new(timeout: Duration, include_path: bool) -> Self {
        Self {
            timeout,
            include_path,
        }
    }

    /// Query `target` for recent and undated items.
    ///
    /// A negative offset is rejected before any request is made. A failed
    /// sub-query only drops its own contribution.
    pub async fn query(
        &self,
        target: &ServerTarget,
        server: &dyn MediaServer,
        offset_days: i64,
        today: NaiveDate,
    ) -> PipelineResult<WindowResult> {
        let offset = u32::try_from(offset_days).map_err(|_| {
            PipelineError::configuration(
                "offset_days",
                format!("must be a non-negative day count, got {}", offset_days),
            )
        })?;

        let mut result = WindowResult::default();
        for window in windows_for(today, offset) {
            let query = CatalogQuery {
                window,
                include_path: self.include_path,
            };

            match with_timeout(&target.name, self.timeout, server.list_items(&query)).await {
                Ok(items) => {
                    debug!(
                        server = %target.name,
                        window = %window,
                        count = items.len(),
                        "Catalog window returned items"
                    );
                    result.items.extend(items);
                }
                Err(e) => {
                    warn!(
                        server = %target.name,
                        window = %window,
                        error = %e,
                        "Catalog window query failed"
                    );
                    result.server_error = Some(ErrorKind::ConnectivityFailure);
                    result.failed_windows.push(window);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_recent_window_boundary() {
        let window = TimeWindow::recent(day(2024, 3, 2), 3);
        assert_eq!(window.mode, WindowMode::MinDate);
        assert_eq!(window.boundary_param(), "2024-02-28");
    }

    #[test]
    fn test_zero_offset_is_today() {
        let window = TimeWindow::recent(day(2024, 3, 2), 0);
        assert_eq!(window.boundary, day(2024, 3, 2));
    }

    #[test]
    fn test_windows_always_two() {
        let [dated, undated] = windows_for(day(2025, 1, 10), 7);
        assert_eq!(dated.boundary, day(2025, 1, 3));
        assert_eq!(undated.mode, WindowMode::MaxDate);
        assert_eq!(undated.boundary_param(), "1900-01-01");
    }
}
