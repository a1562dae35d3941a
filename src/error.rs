//! Pipeline error types
//!
//! Every failure the pipeline can observe maps onto one of four [ErrorKind]s.
//! Configuration errors abort a run before any server is contacted; the other
//! three are recorded and the run keeps going.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the pipeline
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification of a failure, carried into outcomes and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationError,
    ConnectivityFailure,
    RecognitionFailure,
    TransferFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::ConnectivityFailure => "connectivity_failure",
            ErrorKind::RecognitionFailure => "recognition_failure",
            ErrorKind::TransferFailure => "transfer_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the discovery and transfer pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration, detected before any network call
    #[error("invalid configuration for {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// Transport failure, non-2xx status or an unreadable payload
    #[error("{target} unreachable: {message}")]
    Connectivity { target: String, message: String },

    /// A call did not complete within the caller-supplied timeout
    #[error("{target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },

    /// The path could not be resolved to a media identity
    #[error("could not recognize {}: {reason}", path.display())]
    Recognition { path: PathBuf, reason: String },

    /// The transfer capability failed or produced no result
    #[error("transfer of {} failed: {reason}", path.display())]
    Transfer { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub fn connectivity(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Connectivity {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Map onto the coarse kind; timeouts count as connectivity failures
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration { .. } => ErrorKind::ConfigurationError,
            PipelineError::Connectivity { .. } | PipelineError::Timeout { .. } => {
                ErrorKind::ConnectivityFailure
            }
            PipelineError::Recognition { .. } => ErrorKind::RecognitionFailure,
            PipelineError::Transfer { .. } => ErrorKind::TransferFailure,
        }
    }
}

/// Await `fut` for at most `after`, turning an elapsed deadline into [PipelineError::Timeout]
pub async fn with_timeout<T, F>(target: &str, after: Duration, fut: F) -> PipelineResult<T>
where
    F: std::future::Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            target: target.to_string(),
            after,
        }),
    }
}
