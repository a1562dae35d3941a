//! Application configuration management
//!
//! Everything is read from environment variables (a `.env` file is loaded
//! first by the binary). Validation happens here, before any server is
//! contacted.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::PipelineError;
use crate::pipeline::coordinator::RunSettings;
use crate::pipeline::path_map::{PathMapRule, parse_rules};
use crate::pipeline::types::{OperationMode, ServerCapabilities, ServerTarget};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Master switch; a disabled pipeline schedules nothing
    pub enabled: bool,

    /// Terminal action: refresh metadata or rename files
    pub mode: OperationMode,

    /// Six-field cron expression (seconds first), if periodic runs are wanted
    pub schedule: Option<String>,

    /// How many days back the dated window reaches
    pub offset_days: i64,

    /// Send one summary notification per run
    pub notify: bool,

    /// Run once shortly after startup, regardless of the schedule
    pub run_once_immediately: bool,

    /// Server path to local path rewrites, in order
    pub path_mappings: Vec<PathMapRule>,

    /// Bound on every network call
    pub request_timeout: Duration,

    /// Configured media servers
    pub servers: Vec<ServerTarget>,

    /// Destination root for rename mode
    pub library_path: Option<PathBuf>,

    /// TMDB API key for series matching and episode titles
    pub tmdb_api_key: Option<String>,

    /// Webhook receiving run notifications
    pub notify_webhook_url: Option<String>,

    /// Port for the trigger listener
    pub port: u16,
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| {
            let v = v.trim().to_lowercase();
            v == "true" || v == "1" || v == "yes"
        })
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match non_empty(var("FRESHEN_MODE")) {
            Some(mode) => mode.parse().context("Invalid FRESHEN_MODE")?,
            None => OperationMode::Refresh,
        };

        let offset_days = non_empty(var("FRESHEN_OFFSET_DAYS"))
            .unwrap_or_else(|| "0".to_string())
            .parse()
            .context("Invalid FRESHEN_OFFSET_DAYS")?;

        let path_mappings = non_empty(var("FRESHEN_PATH_MAPPINGS"))
            .map(|spec| parse_rules(&spec))
            .transpose()
            .context("Invalid FRESHEN_PATH_MAPPINGS")?
            .unwrap_or_default();

        let request_timeout = Duration::from_secs(
            non_empty(var("FRESHEN_REQUEST_TIMEOUT_SECS"))
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .context("Invalid FRESHEN_REQUEST_TIMEOUT_SECS")?,
        );

        let config = Self {
            enabled: parse_bool(var("FRESHEN_ENABLED"), true),
            mode,
            schedule: non_empty(var("FRESHEN_CRON")),
            offset_days,
            notify: parse_bool(var("FRESHEN_NOTIFY"), false),
            run_once_immediately: parse_bool(var("FRESHEN_RUN_ONCE"), false),
            path_mappings,
            request_timeout,
            servers: servers_from_vars(&var)?,
            library_path: non_empty(var("FRESHEN_LIBRARY_PATH")).map(PathBuf::from),
            tmdb_api_key: non_empty(var("TMDB_API_KEY")),
            notify_webhook_url: non_empty(var("FRESHEN_NOTIFY_WEBHOOK_URL")),
            port: non_empty(var("PORT"))
                .unwrap_or_else(|| "3002".to_string())
                .parse()
                .context("Invalid PORT")?,
        };

        config.validate()
    }

    /// Check invariants and normalize the schedule
    pub fn validate(mut self) -> Result<Self> {
        if self.offset_days < 0 {
            return Err(PipelineError::configuration(
                "offset_days",
                format!("must be a non-negative day count, got {}", self.offset_days),
            )
            .into());
        }

        if let Some(schedule) = &self.schedule {
            self.schedule = Some(normalize_cron(schedule)?);
        }

        if self.mode == OperationMode::Rename && self.library_path.is_none() {
            return Err(PipelineError::configuration(
                "library_path",
                "rename mode needs FRESHEN_LIBRARY_PATH",
            )
            .into());
        }

        if self.enabled && self.servers.is_empty() {
            return Err(PipelineError::configuration(
                "servers",
                "no media servers configured (MEDIA_SERVERS or EMBY_HOST)",
            )
            .into());
        }

        Ok(self)
    }

    /// Run-time settings handed to the coordinator
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            mode: self.mode,
            offset_days: self.offset_days,
            notify_on_completion: self.notify,
            request_timeout: self.request_timeout,
        }
    }
}

/// `MEDIA_SERVERS=a,b` with `MEDIA_SERVER_A_HOST` etc, or the single `EMBY_HOST` form
fn servers_from_vars<F>(var: &F) -> Result<Vec<ServerTarget>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(names) = non_empty(var("MEDIA_SERVERS")) else {
        return Ok(match (non_empty(var("EMBY_HOST")), non_empty(var("EMBY_API_KEY"))) {
            (Some(host), Some(key)) => vec![ServerTarget::new("emby", &host, key)],
            _ => Vec::new(),
        });
    };

    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| -> Result<ServerTarget> {
            let prefix = format!("MEDIA_SERVER_{}_", name.to_uppercase().replace('-', "_"));
            let host = non_empty(var(&format!("{}HOST", prefix)))
                .with_context(|| format!("{}HOST is required", prefix))?;
            let api_key = non_empty(var(&format!("{}API_KEY", prefix)))
                .with_context(|| format!("{}API_KEY is required", prefix))?;
            let capabilities = ServerCapabilities {
                item_listing: parse_bool(var(&format!("{}LISTING", prefix)), true),
                metadata_refresh: parse_bool(var(&format!("{}REFRESH", prefix)), true),
            };
            Ok(ServerTarget::new(name, &host, api_key).with_capabilities(capabilities))
        })
        .collect()
}

/// Accept a 5-field crontab or a 6/7-field expression with seconds; returns the seconds form
pub fn normalize_cron(expr: &str) -> Result<String, PipelineError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();

    let valid_field = |f: &&str| {
        f.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-' | '?' | '#'))
    };
    if !fields.iter().all(valid_field) {
        return Err(PipelineError::configuration(
            "schedule",
            format!("'{}' contains characters not allowed in a cron expression", expr),
        ));
    }

    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(PipelineError::configuration(
            "schedule",
            format!("'{}' has {} fields, expected 5, 6 or 7", expr, n),
        )),
    }
}
