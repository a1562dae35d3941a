//! Run summary notifications
//!
//! One notification per run, never one per item. Individual item failures
//! only show up in the logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::types::{OperationMode, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Failure,
}

/// Message delivered to the notification sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    pub fn from_summary(summary: &RunSummary) -> Self {
        let title = match summary.mode {
            OperationMode::Refresh => format!(
                "Refresh recent metadata (last {} days)",
                summary.offset_days
            ),
            OperationMode::Rename => format!(
                "Rename recent media files (last {} days)",
                summary.offset_days
            ),
        };

        let verb = match summary.mode {
            OperationMode::Refresh => "Refreshed",
            OperationMode::Rename => "Renamed",
        };

        let mut body = if summary.is_success() {
            format!("{} {} items successfully", verb, summary.succeeded)
        } else {
            format!(
                "{} {} of {} items, {} failed, see logs",
                verb, summary.succeeded, summary.total, summary.failed
            )
        };
        if summary.degraded {
            body.push_str("\nOne or more media servers could not be reached");
        }
        if summary.cancelled {
            body.push_str("\nRun was cancelled before all items were processed");
        }

        Self {
            title,
            body,
            severity: if summary.is_success() {
                Severity::Success
            } else {
                Severity::Failure
            },
        }
    }
}

/// Delivery channel for run notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> PipelineResult<()>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, notification: &Notification) -> PipelineResult<()> {
        match notification.severity {
            Severity::Success => info!(
                title = %notification.title,
                body = %notification.body,
                "Run notification"
            ),
            Severity::Failure => error!(
                title = %notification.title,
                body = %notification.body,
                "Run notification"
            ),
        }
        Ok(())
    }
}

/// POSTs the notification as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::connectivity("webhook", e))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> PipelineResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| PipelineError::connectivity("webhook", e))?;

        if !response.status().is_success() {
            return Err(PipelineError::connectivity(
                "webhook",
                format!("webhook returned status: {}", response.status()),
            ));
        }

        info!(url = %self.url, "Delivered run notification");
        Ok(())
    }
}
