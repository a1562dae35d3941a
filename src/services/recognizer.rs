//! Media identity recognition
//!
//! The pipeline only depends on [MediaRecognizer]. [FilenameRecognizer] is the
//! built-in implementation: it parses the path and, when a metadata service is
//! configured, pins TV series to a metadata id.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::filename_parser::parse_media_path;
use super::metadata::MetadataService;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

/// Structured identity of a media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedMedia {
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<u32>,
    /// Metadata-service id, when the series was matched
    pub metadata_id: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl RecognizedMedia {
    pub fn is_episodic(&self) -> bool {
        self.kind == MediaKind::Tv
    }
}

/// Resolves a local path to a media identity
#[async_trait]
pub trait MediaRecognizer: Send + Sync {
    async fn recognize(&self, path: &Path) -> PipelineResult<RecognizedMedia>;
}

/// Recognizer built on the filename parser
#[derive(Clone, Default)]
pub struct FilenameRecognizer {
    metadata: Option<Arc<dyn MetadataService>>,
}

impl FilenameRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require TV series to match on `metadata` before they count as recognized
    pub fn with_metadata(metadata: Arc<dyn MetadataService>) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }
}

#[async_trait]
impl MediaRecognizer for FilenameRecognizer {
    async fn recognize(&self, path: &Path) -> PipelineResult<RecognizedMedia> {
        let parsed = parse_media_path(path).ok_or_else(|| PipelineError::Recognition {
            path: path.to_path_buf(),
            reason: "no title found in path".to_string(),
        })?;

        let mut media = RecognizedMedia {
            kind: if parsed.is_episodic() {
                MediaKind::Tv
            } else {
                MediaKind::Movie
            },
            title: parsed.title,
            year: parsed.year,
            metadata_id: None,
            season: parsed.season,
            episode: parsed.episode,
        };

        if media.is_episodic()
            && let Some(metadata) = &self.metadata
        {
            let series = metadata
                .find_series(&media.title, media.year)
                .await?
                .ok_or_else(|| PipelineError::Recognition {
                    path: path.to_path_buf(),
                    reason: format!("no series matching '{}'", media.title),
                })?;

            info!(title = %media.title, series = %series.name, id = series.id, "Matched series");
            media.title = series.name;
            media.metadata_id = Some(series.id);
            media.year = media.year.or(series.first_air_year);
        }

        debug!(path = %path.display(), kind = ?media.kind, title = %media.title, "Recognized media");
        Ok(media)
    }
}
