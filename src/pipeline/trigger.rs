//! Entry points that start a run: remote action tokens and the scheduler
//!
//! Runs never overlap. A trigger arriving while a run is active is refused,
//! not queued; the next tick or trigger picks the work up.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::pipeline::coordinator::RunCoordinator;
use crate::pipeline::types::{OperationMode, RunSummary};

/// Externally dispatched action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionToken {
    RefreshRecent,
    RenameRecent,
}

impl ActionToken {
    /// Accepts the current tokens and the legacy command names
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().trim_start_matches('/') {
            "refresh-recent" | "refreshrecentmeta" => Some(ActionToken::RefreshRecent),
            "rename-recent" | "renamerecentfile" => Some(ActionToken::RenameRecent),
            _ => None,
        }
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Refresh => ActionToken::RefreshRecent,
            OperationMode::Rename => ActionToken::RenameRecent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionToken::RefreshRecent => "refresh-recent",
            ActionToken::RenameRecent => "rename-recent",
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Serializes access to the coordinator
pub struct TriggerDispatcher {
    coordinator: Arc<RunCoordinator>,
    cancel: CancellationToken,
    running: Mutex<()>,
}

impl TriggerDispatcher {
    pub fn new(coordinator: Arc<RunCoordinator>, cancel: CancellationToken) -> Self {
        Self {
            coordinator,
            cancel,
            running: Mutex::new(()),
        }
    }

    /// Token this dispatcher answers to
    pub fn action(&self) -> ActionToken {
        ActionToken::for_mode(self.coordinator.mode())
    }

    /// Run now if `token` names this pipeline's action; other tokens are ignored
    pub async fn handle_remote_trigger(&self, token: &str) -> Result<Option<RunSummary>, TriggerError> {
        if ActionToken::parse(token) != Some(self.action()) {
            debug!(token = %token, expected = self.action().as_str(), "Ignoring action token");
            return Ok(None);
        }

        info!(token = %token, "Remote trigger received");
        self.run().await.map(Some)
    }

    /// Run now unless a run is already active
    pub async fn run(&self) -> Result<RunSummary, TriggerError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Run requested while another run is active, skipping");
            return Err(TriggerError::AlreadyRunning);
        };

        Ok(self.coordinator.run_once(&self.cancel).await?)
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Wait for an active run, if any, to finish
    pub async fn wait_idle(&self) {
        let _guard = self.running.lock().await;
    }
}
