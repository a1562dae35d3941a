//! Library organizer: moves recognized files into the naming layout
//!
//! Layout:
//! - TV: `{library}/{Series}/Season NN/{Series} - SNNENN - {Episode Title}.ext`
//! - Movies: `{library}/{Title (Year)}/{Title (Year)}.ext`
//!
//! A transfer that cannot be named or whose source is not a regular file
//! yields no result rather than an error.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metadata::{EpisodeInfo, episode_title};
use super::recognizer::{MediaKind, RecognizedMedia};
use crate::error::{PipelineError, PipelineResult};

/// How the file reaches its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Rename in place, falling back to copy + delete across filesystems
    Move,
    /// Copy and keep the original
    Copy,
}

/// Input to one transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub media: &'a RecognizedMedia,
    pub source: &'a Path,
    pub episodes: Option<&'a [EpisodeInfo]>,
    pub mode: TransferMode,
}

/// Where a file ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Transfer capability consumed by the rename path
#[async_trait]
pub trait TransferService: Send + Sync {
    /// `Ok(None)` means the transfer produced nothing and counts as a failure
    async fn transfer(&self, request: TransferRequest<'_>) -> PipelineResult<Option<TransferResult>>;
}

/// Filesystem organizer rooted at a library directory
#[derive(Debug, Clone)]
pub struct LibraryMover {
    library_root: PathBuf,
}

impl LibraryMover {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    /// Destination path for the request, or `None` when the identity is too thin to name it
    pub fn destination(&self, request: &TransferRequest<'_>) -> Option<PathBuf> {
        let media = request.media;
        let extension = request
            .source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        match media.kind {
            MediaKind::Tv => {
                let episode = media.episode?;
                let season = media.season.unwrap_or(1);
                let title = request.episodes.and_then(|eps| episode_title(eps, episode));
                Some(self.organize_episode(&media.title, season, episode, title, &extension))
            }
            MediaKind::Movie => Some(self.organize_movie(&media.title, media.year, &extension)),
        }
    }

    fn organize_movie(&self, title: &str, year: Option<u32>, extension: &str) -> PathBuf {
        let sanitized_title = sanitize_filename::sanitize(title);
        let name = match year {
            Some(year) => format!("{} ({})", sanitized_title, year),
            None => sanitized_title,
        };

        self.library_root
            .join(&name)
            .join(format!("{}{}", name, extension))
    }

    fn organize_episode(
        &self,
        show_name: &str,
        season: u32,
        episode: u32,
        episode_title: Option<&str>,
        extension: &str,
    ) -> PathBuf {
        let sanitized_show = sanitize_filename::sanitize(show_name);
        let season_folder = format!("Season {:02}", season);

        let file_name = match episode_title {
            Some(title) => format!(
                "{} - S{:02}E{:02} - {}{}",
                sanitized_show,
                season,
                episode,
                sanitize_filename::sanitize(title),
                extension
            ),
            None => format!(
                "{} - S{:02}E{:02}{}",
                sanitized_show, season, episode, extension
            ),
        };

        self.library_root
            .join(&sanitized_show)
            .join(season_folder)
            .join(file_name)
    }
}

fn io_error(path: &Path, action: &str, e: io::Error) -> PipelineError {
    PipelineError::Transfer {
        path: path.to_path_buf(),
        reason: format!("{}: {}", action, e),
    }
}

/// Sibling of `destination` a copy is written to before it is renamed into place
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn copy_then_rename(source: &Path, partial: &Path, destination: &Path) -> PipelineResult<()> {
    tokio::fs::copy(source, partial)
        .await
        .map_err(|e| io_error(source, "copy", e))?;
    tokio::fs::rename(partial, destination)
        .await
        .map_err(|e| io_error(destination, "place copy", e))
}

/// Copy through a `.part` sibling so `destination` only ever appears complete
async fn copy_into_place(source: &Path, destination: &Path) -> PipelineResult<()> {
    let partial = partial_path(destination);
    let placed = copy_then_rename(source, &partial, destination).await;

    if placed.is_err()
        && let Err(e) = tokio::fs::remove_file(&partial).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(partial = %partial.display(), error = %e, "Could not remove partial copy");
    }
    placed
}

/// Rename, or copy then delete when the rename crosses filesystems
async fn move_file(source: &Path, destination: &Path) -> PipelineResult<()> {
    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                source = %source.display(),
                "Destination is on another filesystem, falling back to copy + delete"
            );
            copy_into_place(source, destination).await?;
            tokio::fs::remove_file(source)
                .await
                .map_err(|e| io_error(source, "remove original", e))
        }
        Err(e) => Err(io_error(source, "rename", e)),
    }
}

#[async_trait]
impl TransferService for LibraryMover {
    async fn transfer(&self, request: TransferRequest<'_>) -> PipelineResult<Option<TransferResult>> {
        let source = request.source;

        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                warn!(source = %source.display(), "Source is not a regular file");
                return Ok(None);
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Source is not readable");
                return Ok(None);
            }
        }

        let Some(destination) = self.destination(&request) else {
            warn!(
                source = %source.display(),
                title = %request.media.title,
                "Not enough identity to name the file"
            );
            return Ok(None);
        };

        if destination == source {
            info!(path = %source.display(), "File already organized");
            return Ok(Some(TransferResult {
                source: source.to_path_buf(),
                destination,
            }));
        }

        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            warn!(destination = %destination.display(), "Destination already exists");
            return Ok(None);
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, "create directory", e))?;
        }

        match request.mode {
            TransferMode::Move => move_file(source, &destination).await?,
            TransferMode::Copy => copy_into_place(source, &destination).await?,
        }

        info!(
            source = %source.display(),
            destination = %destination.display(),
            mode = ?request.mode,
            "Transferred file"
        );

        Ok(Some(TransferResult {
            source: source.to_path_buf(),
            destination,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(title: &str, season: Option<u32>, episode: Option<u32>) -> RecognizedMedia {
        RecognizedMedia {
            kind: MediaKind::Tv,
            title: title.to_string(),
            year: None,
            metadata_id: None,
            season,
            episode,
        }
    }

    fn request<'a>(media: &'a RecognizedMedia, source: &'a Path) -> TransferRequest<'a> {
        TransferRequest {
            media,
            source,
            episodes: None,
            mode: TransferMode::Move,
        }
    }

    #[test]
    fn test_episode_destination_with_title() {
        let mover = LibraryMover::new("/library");
        let media = episode("Chicago Fire", Some(14), Some(8));
        let episodes = vec![EpisodeInfo {
            season: 14,
            episode: 8,
            name: "Bad Day".into(),
            air_date: None,
        }];
        let source = PathBuf::from("/dl/x.MKV");
        let req = TransferRequest {
            episodes: Some(episodes.as_slice()),
            ..request(&media, &source)
        };
        assert_eq!(
            mover.destination(&req),
            Some(PathBuf::from(
                "/library/Chicago Fire/Season 14/Chicago Fire - S14E08 - Bad Day.mkv"
            ))
        );
    }

    #[test]
    fn test_episode_defaults_to_season_one() {
        let mover = LibraryMover::new("/library");
        let media = episode("Show", None, Some(3));
        let source = PathBuf::from("/dl/x.mkv");
        assert_eq!(
            mover.destination(&request(&media, &source)),
            Some(PathBuf::from("/library/Show/Season 01/Show - S01E03.mkv"))
        );
    }

    #[test]
    fn test_episode_without_number_has_no_destination() {
        let mover = LibraryMover::new("/library");
        let media = episode("Show", Some(1), None);
        let source = PathBuf::from("/dl/x.mkv");
        assert_eq!(mover.destination(&request(&media, &source)), None);
    }

    #[test]
    fn test_movie_destination() {
        let mover = LibraryMover::new("/library");
        let media = RecognizedMedia {
            kind: MediaKind::Movie,
            title: "Heat".into(),
            year: Some(1995),
            metadata_id: None,
            season: None,
            episode: None,
        };
        let source = PathBuf::from("/dl/heat.mkv");
        assert_eq!(
            mover.destination(&request(&media, &source)),
            Some(PathBuf::from("/library/Heat (1995)/Heat (1995).mkv"))
        );
    }

    #[tokio::test]
    async fn test_move_into_library() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Show.S01E02.mkv");
        tokio::fs::write(&source, b"video").await.unwrap();

        let mover = LibraryMover::new(dir.path().join("library"));
        let media = episode("Show", Some(1), Some(2));
        let result = mover.transfer(request(&media, &source)).await.unwrap().unwrap();

        assert!(!source.exists());
        assert!(result.destination.ends_with("Show/Season 01/Show - S01E02.mkv"));
        assert!(result.destination.exists());
    }

    #[tokio::test]
    async fn test_copy_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Show.S01E02.mkv");
        tokio::fs::write(&source, b"video").await.unwrap();

        let mover = LibraryMover::new(dir.path().join("library"));
        let media = episode("Show", Some(1), Some(2));
        let req = TransferRequest {
            mode: TransferMode::Copy,
            ..request(&media, &source)
        };
        let result = mover.transfer(req).await.unwrap().unwrap();

        assert!(source.exists());
        assert!(result.destination.exists());
    }

    #[tokio::test]
    async fn test_missing_source_has_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.mkv");
        let mover = LibraryMover::new(dir.path().join("library"));
        let media = episode("Show", Some(1), Some(2));
        assert_eq!(mover.transfer(request(&media, &source)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_copy_replaces_stale_partial() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mkv");
        let destination = dir.path().join("Show - S01E02.mkv");
        tokio::fs::write(&source, b"complete video").await.unwrap();
        // left behind by a copy that never finished
        tokio::fs::write(partial_path(&destination), b"comp").await.unwrap();

        copy_into_place(&source, &destination).await.unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"complete video");
        assert!(!partial_path(&destination).exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_failed_placement_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mkv");
        tokio::fs::write(&source, b"video").await.unwrap();
        // a non-empty directory in the way makes the final rename fail
        let destination = dir.path().join("Show - S01E02.mkv");
        tokio::fs::create_dir_all(destination.join("occupied")).await.unwrap();

        let err = copy_into_place(&source, &destination).await.unwrap_err();

        assert!(matches!(err, PipelineError::Transfer { .. }));
        assert!(!partial_path(&destination).exists());
        assert!(destination.is_dir());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_rename_error_is_not_retried_as_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gone.mkv");
        let destination = dir.path().join("Show - S01E02.mkv");

        let err = move_file(&source, &destination).await.unwrap_err();

        match err {
            PipelineError::Transfer { reason, .. } => assert!(reason.starts_with("rename:"), "{}", reason),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!partial_path(&destination).exists());
    }

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/library/Show/Season 01/Show - S01E02.mkv")),
            PathBuf::from("/library/Show/Season 01/Show - S01E02.mkv.part")
        );
    }
}
