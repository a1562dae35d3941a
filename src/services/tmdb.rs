//! TMDB (The Movie Database) client for series lookup and season episode lists
//!
//! Base URL: https://api.themoviedb.org/3
//!
//! Rate limiting: TMDB allows ~40 requests per 10 seconds.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::filename_parser::show_name_similarity;
use super::metadata::{EpisodeInfo, MetadataService, SeriesMatch};
use super::rate_limiter::RateLimitedClient;
use crate::error::{PipelineError, PipelineResult};

/// Candidates scoring below this are not considered a match
const MIN_SIMILARITY: f64 = 0.6;

/// TMDB API client with rate limiting
pub struct TmdbClient {
    client: RateLimitedClient,
    base_url: String,
    api_key: String,
}

/// TV search result page from TMDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbTvSearchResult {
    pub page: i32,
    pub results: Vec<TmdbTvShow>,
    pub total_results: i32,
}

/// TV show summary from TMDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbTvShow {
    pub id: i32,
    pub name: String,
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
    pub popularity: Option<f64>,
}

impl TmdbTvShow {
    /// Parse year from first_air_date (YYYY-MM-DD format)
    pub fn year(&self) -> Option<u32> {
        self.first_air_date
            .as_ref()
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse().ok())
    }
}

/// Season details from TMDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbSeason {
    pub season_number: u32,
    #[serde(default)]
    pub episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbEpisode {
    pub episode_number: u32,
    pub season_number: u32,
    #[serde(default)]
    pub name: String,
    pub air_date: Option<String>,
}

impl From<TmdbEpisode> for EpisodeInfo {
    fn from(e: TmdbEpisode) -> Self {
        Self {
            season: e.season_number,
            episode: e.episode_number,
            name: e.name,
            air_date: e.air_date,
        }
    }
}

impl TmdbClient {
    /// Create a new TMDB client with the given API key
    pub fn new(api_key: String, timeout: Duration) -> PipelineResult<Self> {
        Self::with_base_url(api_key, "https://api.themoviedb.org/3", timeout)
    }

    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> PipelineResult<Self> {
        Ok(Self {
            client: RateLimitedClient::for_tmdb(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Check if the client has a valid API key configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn error(&self, message: impl std::fmt::Display) -> PipelineError {
        PipelineError::connectivity(self.client.name(), message)
    }

    /// Search for TV shows by name
    pub async fn search_tv(&self, query: &str, year: Option<u32>) -> PipelineResult<Vec<TmdbTvShow>> {
        if !self.has_api_key() {
            return Err(self.error("TMDB API key not configured"));
        }

        info!(query = %query, year = ?year, "Searching TMDB for TV show");

        let url = format!("{}/search/tv", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("query", query.to_string()),
            ("include_adult", "false".to_string()),
        ];
        if let Some(y) = year {
            params.push(("first_air_date_year", y.to_string()));
        }

        let response = self.client.get_with_query(&url, &params).await?;

        if response.status().as_u16() == 401 {
            return Err(self.error("TMDB API key is invalid"));
        }
        if !response.status().is_success() {
            return Err(self.error(format!("TMDB search failed with status: {}", response.status())));
        }

        let results: TmdbTvSearchResult = response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse TMDB search results: {}", e)))?;

        debug!(count = results.results.len(), "TMDB search returned results");
        Ok(results.results)
    }

    /// Get one season with its episodes
    pub async fn get_season(&self, tv_id: i32, season: u32) -> PipelineResult<TmdbSeason> {
        if !self.has_api_key() {
            return Err(self.error("TMDB API key not configured"));
        }

        debug!("Fetching season {} of TMDB show {}", season, tv_id);

        let url = format!("{}/tv/{}/season/{}", self.base_url, tv_id, season);
        let response = self
            .client
            .get_with_query(&url, &[("api_key", self.api_key.as_str())])
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(TmdbSeason {
                season_number: season,
                episodes: Vec::new(),
            });
        }
        if !response.status().is_success() {
            return Err(self.error(format!("TMDB get season failed with status: {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| self.error(format!("Failed to parse TMDB season: {}", e)))
    }
}

/// Pick the closest candidate by name, preferring a matching first-air year
pub fn best_match(title: &str, year: Option<u32>, candidates: &[TmdbTvShow]) -> Option<SeriesMatch> {
    candidates
        .iter()
        .map(|show| {
            let mut score = show_name_similarity(title, &show.name);
            if let Some(original) = &show.original_name {
                score = score.max(show_name_similarity(title, original));
            }
            if year.is_some() && show.year() == year {
                score += 0.1;
            }
            (score, show)
        })
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, show)| SeriesMatch {
            id: show.id,
            name: show.name.clone(),
            first_air_year: show.year(),
        })
}

#[async_trait]
impl MetadataService for TmdbClient {
    async fn find_series(&self, title: &str, year: Option<u32>) -> PipelineResult<Option<SeriesMatch>> {
        let mut candidates = self.search_tv(title, year).await?;
        if candidates.is_empty() && year.is_some() {
            candidates = self.search_tv(title, None).await?;
        }
        Ok(best_match(title, year, &candidates))
    }

    async fn season_episodes(&self, series_id: i32, season: u32) -> PipelineResult<Vec<EpisodeInfo>> {
        let season = self.get_season(series_id, season).await?;
        Ok(season.episodes.into_iter().map(EpisodeInfo::from).collect())
    }
}
