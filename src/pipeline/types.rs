//! Shared pipeline types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, PipelineError};

/// Terminal action applied to every discovered item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Ask the media server to re-fetch metadata and images
    Refresh,
    /// Recognize the file and move it into the organized library
    Rename,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Refresh => "refresh",
            OperationMode::Rename => "rename",
        }
    }

    /// Rename mode needs the file path in catalog responses
    pub fn needs_path(&self) -> bool {
        matches!(self, OperationMode::Rename)
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "refresh" => Ok(OperationMode::Refresh),
            "rename" => Ok(OperationMode::Rename),
            other => Err(PipelineError::configuration(
                "mode",
                format!("expected 'refresh' or 'rename', got '{}'", other),
            )),
        }
    }
}

/// What a configured media server is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub metadata_refresh: bool,
    pub item_listing: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            metadata_refresh: true,
            item_listing: true,
        }
    }
}

/// One configured media-server instance, fixed for the duration of a run
#[derive(Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub name: String,
    /// Normalized base endpoint, always with scheme and trailing slash
    pub host: String,
    pub api_key: String,
    pub capabilities: ServerCapabilities,
}

impl ServerTarget {
    pub fn new(name: impl Into<String>, host: &str, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: normalize_host(host),
            api_key: api_key.into(),
            capabilities: ServerCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl fmt::Debug for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTarget")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Prefix `http://` when no scheme is given and make sure the host ends with `/`
pub fn normalize_host(host: &str) -> String {
    let mut host = host.trim().to_string();
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("http://{}", host);
    }
    if !host.ends_with('/') {
        host.push('/');
    }
    host
}

/// One raw item returned by a catalog query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Server-scoped opaque identifier
    pub id: String,
    pub name: String,
    pub series_name: Option<String>,
    /// Absent unless the query asked for paths
    pub path: Option<String>,
}

impl CatalogItem {
    /// "Series - Episode" when the series is known, else just the name
    pub fn display_name(&self) -> String {
        match &self.series_name {
            Some(series) => format!("{} - {}", series, self.name),
            None => self.name.clone(),
        }
    }
}

/// Result of processing one item; never discarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub item_id: String,
    pub succeeded: bool,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
}

impl TransferOutcome {
    pub fn success(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            succeeded: true,
            error_kind: None,
            message: message.into(),
        }
    }

    pub fn failure(item_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            succeeded: false,
            error_kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn from_error(item_id: impl Into<String>, err: &PipelineError) -> Self {
        Self::failure(item_id, err.kind(), err.to_string())
    }
}

/// Aggregate over one pipeline execution
///
/// Mutated only by the coordinator, handed to the notification step once, then dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: OperationMode,
    pub offset_days: u32,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// At least one server-level connectivity failure happened
    pub degraded: bool,
    pub cancelled: bool,
    pub outcomes: Vec<TransferOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(mode: OperationMode, offset_days: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            offset_days,
            total: 0,
            succeeded: 0,
            failed: 0,
            degraded: false,
            cancelled: false,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, outcome: TransferOutcome) {
        self.total += 1;
        if outcome.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Clean run: nothing failed, every server answered, not cut short
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.degraded && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("emby.local:8096"), "http://emby.local:8096/");
        assert_eq!(normalize_host("https://emby.example/"), "https://emby.example/");
        assert_eq!(normalize_host(" http://10.0.0.2:8096 "), "http://10.0.0.2:8096/");
    }

    #[test]
    fn test_operation_mode_parse() {
        assert_eq!("Refresh".parse::<OperationMode>().unwrap(), OperationMode::Refresh);
        assert_eq!("rename".parse::<OperationMode>().unwrap(), OperationMode::Rename);
        assert!("copy".parse::<OperationMode>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new(OperationMode::Refresh, 2);
        summary.record(TransferOutcome::success("1", "ok"));
        summary.record(TransferOutcome::failure("2", ErrorKind::TransferFailure, "no result"));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_server_target_debug_hides_key() {
        let target = ServerTarget::new("emby", "localhost:8096", "secret");
        let debug = format!("{:?}", target);
        assert!(!debug.contains("secret"));
    }
}
