//! Per-item transfer: recognize, fetch episode metadata, move
//!
//! Steps run strictly in order and nothing is rolled back. If the move fails
//! after metadata was fetched, the fetch simply goes unused. A cross-device
//! move copies into a `.part` file first, so the library never holds a
//! half-written destination. Callers get at-most-once semantics per item per run.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ErrorKind, with_timeout};
use crate::pipeline::types::TransferOutcome;
use crate::services::metadata::MetadataService;
use crate::services::organizer::{TransferMode, TransferRequest, TransferService};
use crate::services::recognizer::MediaRecognizer;

/// Drives one item through recognition and transfer
#[derive(Clone)]
pub struct TransferExecutor {
    recognizer: Arc<dyn MediaRecognizer>,
    metadata: Option<Arc<dyn MetadataService>>,
    transfer: Arc<dyn TransferService>,
    /// Bound on recognizer and metadata calls
    timeout: Duration,
}

impl TransferExecutor {
    pub fn new(
        recognizer: Arc<dyn MediaRecognizer>,
        metadata: Option<Arc<dyn MetadataService>>,
        transfer: Arc<dyn TransferService>,
        timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            metadata,
            transfer,
            timeout,
        }
    }

    pub async fn execute(&self, item_id: &str, local_path: &str) -> TransferOutcome {
        let path = Path::new(local_path);

        // 1. identity
        let media = match with_timeout("recognizer", self.timeout, self.recognizer.recognize(path)).await {
            Ok(media) => media,
            Err(e) => {
                warn!(item_id = %item_id, path = %local_path, error = %e, "Recognition failed");
                return TransferOutcome::failure(item_id, ErrorKind::RecognitionFailure, e.to_string());
            }
        };

        // 2. episode list for the recognized season, default season 1
        let mut episodes = None;
        if media.is_episodic()
            && let (Some(metadata), Some(series_id)) = (&self.metadata, media.metadata_id)
        {
            let season = media.season.unwrap_or(1);
            match with_timeout(
                "metadata",
                self.timeout,
                metadata.season_episodes(series_id, season),
            )
            .await
            {
                Ok(list) => {
                    debug!(item_id = %item_id, season, count = list.len(), "Fetched season episodes");
                    episodes = Some(list);
                }
                Err(e) => {
                    warn!(
                        item_id = %item_id,
                        series_id,
                        season,
                        error = %e,
                        "Episode metadata unavailable, transferring without it"
                    );
                }
            }
        }

        // 3. move
        let request = TransferRequest {
            media: &media,
            source: path,
            episodes: episodes.as_deref(),
            mode: TransferMode::Move,
        };
        // Local filesystem work: not bounded by the request timeout, a dropped
        // copy would leave a duplicate behind
        let result = self.transfer.transfer(request).await;

        // 4. no result object is a failure in its own right
        match result {
            Ok(Some(done)) => {
                info!(
                    item_id = %item_id,
                    source = %done.source.display(),
                    destination = %done.destination.display(),
                    "Renamed media file"
                );
                TransferOutcome::success(
                    item_id,
                    format!("{} -> {}", done.source.display(), done.destination.display()),
                )
            }
            Ok(None) => {
                warn!(item_id = %item_id, path = %local_path, "Transfer produced no result");
                TransferOutcome::failure(
                    item_id,
                    ErrorKind::TransferFailure,
                    format!("transfer of {} produced no result", local_path),
                )
            }
            Err(e) => {
                warn!(item_id = %item_id, path = %local_path, error = %e, "Transfer failed");
                TransferOutcome::failure(item_id, ErrorKind::TransferFailure, e.to_string())
            }
        }
    }
}
