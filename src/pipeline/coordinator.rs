//! One full pipeline execution
//!
//! Phases: Idle -> Querying -> Processing(i) ... -> Summarizing -> Idle.
//! Targets are processed one after another and items strictly in order. The
//! cancellation token is checked between items; a cancelled run still
//! produces exactly one summary covering what was processed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{ErrorKind, PipelineError, PipelineResult, with_timeout};
use crate::pipeline::executor::TransferExecutor;
use crate::pipeline::path_map::PathMapper;
use crate::pipeline::types::{CatalogItem, OperationMode, RunSummary, ServerTarget, TransferOutcome};
use crate::pipeline::window::WindowQuery;
use crate::services::media_server::MediaServer;
use crate::services::notifications::{Notification, NotificationSink};

/// Settings a run reads; immutable for its duration
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub mode: OperationMode,
    pub offset_days: i64,
    pub notify_on_completion: bool,
    /// Bound on every network call made during the run
    pub request_timeout: Duration,
}

/// A configured server together with the client that talks to it
#[derive(Clone)]
pub struct ServerHandle {
    pub target: ServerTarget,
    pub client: Arc<dyn MediaServer>,
}

/// Where a run currently is, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Querying,
    Processing(usize),
    Summarizing,
}

/// Orchestrates discovery, per-item processing and the single summary notification
pub struct RunCoordinator {
    settings: RunSettings,
    servers: Vec<ServerHandle>,
    path_mapper: PathMapper,
    executor: Option<TransferExecutor>,
    notifier: Arc<dyn NotificationSink>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl RunCoordinator {
    pub fn new(
        settings: RunSettings,
        servers: Vec<ServerHandle>,
        path_mapper: PathMapper,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            settings,
            servers,
            path_mapper,
            executor: None,
            notifier,
            today: local_today,
        }
    }

    /// Executor used in rename mode
    pub fn with_executor(mut self, executor: TransferExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Override the date the query windows are computed from
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn mode(&self) -> OperationMode {
        self.settings.mode
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the pipeline once.
    ///
    /// Fails only on configuration problems, before any server is contacted.
    pub async fn run_once(&self, cancel: &CancellationToken) -> PipelineResult<RunSummary> {
        let query = WindowQuery::new(self.settings.request_timeout, self.settings.mode.needs_path());
        let offset = u32::try_from(self.settings.offset_days).map_err(|_| {
            PipelineError::configuration(
                "offset_days",
                format!("must be a non-negative day count, got {}", self.settings.offset_days),
            )
        })?;

        let mut summary = RunSummary::new(self.settings.mode, offset);
        let span = info_span!("run", run_id = %summary.run_id, mode = %self.settings.mode);

        async {
            let mut phase = RunPhase::Idle;
            info!(?phase, servers = self.servers.len(), offset_days = offset, "Starting run");
            let today = (self.today)();
            let mut processed = 0usize;

            'targets: for server in &self.servers {
                if !server.target.capabilities.item_listing {
                    debug!(server = %server.target.name, "Server does not support listing, skipping");
                    continue;
                }
                if cancel.is_cancelled() {
                    summary.mark_cancelled();
                    break;
                }

                phase = RunPhase::Querying;
                debug!(server = %server.target.name, ?phase, "Querying catalog");
                let result = query
                    .query(&server.target, server.client.as_ref(), self.settings.offset_days, today)
                    .await?;

                if result.server_error == Some(ErrorKind::ConnectivityFailure) {
                    summary.mark_degraded();
                    error!(
                        server = %server.target.name,
                        failed_windows = result.failed_windows.len(),
                        "Could not reach media server"
                    );
                }

                for item in &result.items {
                    if cancel.is_cancelled() {
                        summary.mark_cancelled();
                        break 'targets;
                    }
                    phase = RunPhase::Processing(processed);
                    debug!(?phase, item_id = %item.id, "Processing item");

                    let outcome = self.process_item(server, item).await;
                    summary.record(outcome);
                    processed += 1;
                }
            }

            if summary.cancelled {
                warn!(processed, "Run cancelled");
            }

            phase = RunPhase::Summarizing;
            summary.finish();
            info!(
                ?phase,
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                degraded = summary.degraded,
                cancelled = summary.cancelled,
                "Run finished"
            );

            if self.settings.notify_on_completion {
                let notification = Notification::from_summary(&summary);
                if let Err(e) = self.notifier.send(&notification).await {
                    warn!(error = %e, "Failed to deliver run notification");
                }
            }
            debug!(phase = ?RunPhase::Idle, "Run complete");

            Ok::<_, PipelineError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Terminal action for one item; never fails the run
    async fn process_item(&self, server: &ServerHandle, item: &CatalogItem) -> TransferOutcome {
        match self.settings.mode {
            OperationMode::Refresh => self.refresh_item(server, item).await,
            OperationMode::Rename => self.rename_item(item).await,
        }
    }

    async fn refresh_item(&self, server: &ServerHandle, item: &CatalogItem) -> TransferOutcome {
        if !server.target.capabilities.metadata_refresh {
            return TransferOutcome::failure(
                &item.id,
                ErrorKind::ConfigurationError,
                format!("{} does not support metadata refresh", server.target.name),
            );
        }

        match with_timeout(
            &server.target.name,
            self.settings.request_timeout,
            server.client.refresh_item(&item.id),
        )
        .await
        {
            Ok(()) => {
                info!(item = %item.display_name(), "Refreshed metadata");
                TransferOutcome::success(&item.id, format!("refreshed {}", item.display_name()))
            }
            Err(e) => {
                error!(item_id = %item.id, error = %e, "Failed to refresh item");
                TransferOutcome::from_error(&item.id, &e)
            }
        }
    }

    async fn rename_item(&self, item: &CatalogItem) -> TransferOutcome {
        let Some(local_path) = self.path_mapper.resolve(item.path.as_deref()) else {
            warn!(item_id = %item.id, "Catalog item has no file path");
            return TransferOutcome::failure(
                &item.id,
                ErrorKind::RecognitionFailure,
                "catalog item has no file path",
            );
        };

        let Some(executor) = &self.executor else {
            return TransferOutcome::failure(
                &item.id,
                ErrorKind::ConfigurationError,
                "rename mode has no transfer executor",
            );
        };

        info!(item_id = %item.id, path = %local_path, "Renaming media file");
        executor.execute(&item.id, &local_path).await
    }
}
