//! Episode metadata capability consumed by the transfer step

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// A series matched on the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMatch {
    pub id: i32,
    pub name: String,
    pub first_air_year: Option<u32>,
}

/// One episode of a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub air_date: Option<String>,
}

/// Series lookup and season episode lists
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Best match for a series title, or `None` when nothing is close enough
    async fn find_series(&self, title: &str, year: Option<u32>) -> PipelineResult<Option<SeriesMatch>>;

    /// All episodes of one season of a series
    async fn season_episodes(&self, series_id: i32, season: u32) -> PipelineResult<Vec<EpisodeInfo>>;
}

/// Title of `episode` in `episodes`, if listed
pub fn episode_title(episodes: &[EpisodeInfo], episode: u32) -> Option<&str> {
    episodes
        .iter()
        .find(|e| e.episode == episode)
        .map(|e| e.name.as_str())
        .filter(|name| !name.is_empty())
}
