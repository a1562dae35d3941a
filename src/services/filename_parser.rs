//! Filename parser for scene-style media paths
//!
//! Handles paths like:
//! - "/tv/Chicago Fire/Season 14/Chicago Fire S14E08 1080p WEB h264-ETHEL.mkv"
//! - "/tv/The Office/Season 02/S02E03.mkv" (series taken from the folders)
//! - "/tv/Corner.Gas.6x12.720p.mkv"
//! - "/movies/Heat (1995)/Heat (1995).mkv"

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;
use tracing::debug;

static SXXEXX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)\s*\bS(\d{1,2})\s*E(\d{1,3})").expect("valid regex"));
static NXNN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)\s*\b(\d{1,2})x(\d{2,3})\b").expect("valid regex"));
static VERBOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s*\bSeason\s*(\d+).*?Episode\s*(\d+)").expect("valid regex")
});
static MOVIE_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*[(\[]?\b(19\d{2}|20\d{2})\b[)\]]?").expect("valid regex")
});
static SEASON_DIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:season|s)\s*(\d{1,2})$").expect("valid regex"));
static TRAILING_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(?(19\d{2}|20\d{2})\)?\s*$").expect("valid regex"));
static COUNTRY_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(US|UK|AU|NZ)\s*$").expect("valid regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SPECIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));

/// Identity parsed from a path, before any metadata lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMedia {
    pub title: String,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Lowercase extension without the dot
    pub extension: Option<String>,
}

impl ParsedMedia {
    /// Anything with a season or an episode number is treated as TV
    pub fn is_episodic(&self) -> bool {
        self.season.is_some() || self.episode.is_some()
    }
}

/// Parse a media path; `None` when no title can be found anywhere
pub fn parse_media_path(path: &Path) -> Option<ParsedMedia> {
    let stem = path.file_stem()?.to_str()?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let cleaned = stem.replace(['.', '_'], " ");
    let folders = FolderHints::from_path(path);

    let mut parsed = match parse_episode(&cleaned) {
        Some((name, season, episode)) => ParsedMedia {
            title: name,
            season,
            episode,
            ..Default::default()
        },
        None => parse_movie(&cleaned),
    };
    parsed.extension = extension;

    if parsed.is_episodic() {
        if parsed.title.is_empty() {
            parsed.title = folders.series.clone().unwrap_or_default();
        }
        if parsed.season.is_none() {
            parsed.season = folders.season;
        }
    } else if parsed.title.is_empty() {
        parsed.title = folders.parent.clone().map(|p| clean_title(&p)).unwrap_or_default();
    }

    if parsed.year.is_none() {
        parsed.year = extract_year(&parsed.title);
    }
    parsed.title = clean_title(&parsed.title);

    debug!(
        path = %path.display(),
        title = %parsed.title,
        season = ?parsed.season,
        episode = ?parsed.episode,
        year = ?parsed.year,
        "Parsed media path"
    );

    if parsed.title.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

/// `(series, season, episode)` from the S01E02, 1x02 and "Season 1 Episode 2" forms
fn parse_episode(cleaned: &str) -> Option<(String, Option<u32>, Option<u32>)> {
    [&*SXXEXX_RE, &*NXNN_RE, &*VERBOSE_RE]
        .into_iter()
        .find_map(|re| re.captures(cleaned))
        .map(|caps| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            (
                name.replace('-', " ").trim().to_string(),
                caps.get(2).and_then(|m| m.as_str().parse().ok()),
                caps.get(3).and_then(|m| m.as_str().parse().ok()),
            )
        })
}

fn parse_movie(cleaned: &str) -> ParsedMedia {
    match MOVIE_YEAR_RE.captures(cleaned) {
        Some(caps) => ParsedMedia {
            title: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            year: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            ..Default::default()
        },
        None => ParsedMedia {
            title: cleaned.to_string(),
            ..Default::default()
        },
    }
}

/// What the enclosing folders say about the file
#[derive(Debug, Default)]
struct FolderHints {
    parent: Option<String>,
    series: Option<String>,
    season: Option<u32>,
}

impl FolderHints {
    fn from_path(path: &Path) -> Self {
        let mut names = path
            .ancestors()
            .skip(1)
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()));

        let parent = names.next().map(str::to_string);
        let season = parent
            .as_deref()
            .and_then(|p| SEASON_DIR_RE.captures(p.trim()))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        // Inside "Season N" the series is one level further up
        let series = if season.is_some() {
            names.next().map(str::to_string)
        } else {
            parent.clone()
        };

        Self {
            parent,
            series: series.map(|s| s.replace(['.', '_'], " ")),
            season,
        }
    }
}

fn extract_year(title: &str) -> Option<u32> {
    TRAILING_YEAR_RE
        .captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Trim trailing year, country suffix and extra whitespace
fn clean_title(name: &str) -> String {
    let cleaned = TRAILING_YEAR_RE.replace(name.trim(), "");
    let cleaned = COUNTRY_SUFFIX_RE.replace(&cleaned, "");
    SPACES_RE.replace_all(&cleaned, " ").trim().to_string()
}

/// Lowercase, drop leading articles and punctuation
pub fn normalize_show_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();

    for article in ["the ", "a ", "an "] {
        if let Some(rest) = normalized.strip_prefix(article) {
            normalized = rest.to_string();
        }
    }

    let normalized = SPECIAL_RE.replace_all(&normalized, "");
    SPACES_RE.replace_all(&normalized, " ").trim().to_string()
}

/// Similarity between two show names (0.0 to 1.0)
pub fn show_name_similarity(name1: &str, name2: &str) -> f64 {
    let n1 = normalize_show_name(name1);
    let n2 = normalize_show_name(name2);

    if n1 == n2 {
        return 1.0;
    }
    normalized_levenshtein(&n1, &n2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(path: &str) -> ParsedMedia {
        parse_media_path(&PathBuf::from(path)).unwrap()
    }

    #[test]
    fn test_parse_sxxexx() {
        let result = parse("/tv/Chicago Fire/Season 14/Chicago Fire S14E08 1080p WEB h264-ETHEL.mkv");
        assert_eq!(result.title, "Chicago Fire");
        assert_eq!(result.season, Some(14));
        assert_eq!(result.episode, Some(8));
        assert_eq!(result.extension.as_deref(), Some("mkv"));
    }

    #[test]
    fn test_series_from_folders() {
        let result = parse("/tv/The Office/Season 02/S02E03.mkv");
        assert_eq!(result.title, "The Office");
        assert_eq!(result.season, Some(2));
        assert_eq!(result.episode, Some(3));
    }

    #[test]
    fn test_parse_nxnn() {
        let result = parse("/tv/Corner.Gas.6x12.720p.mkv");
        assert_eq!(result.title, "Corner Gas");
        assert_eq!(result.season, Some(6));
        assert_eq!(result.episode, Some(12));
    }

    #[test]
    fn test_parse_movie() {
        let result = parse("/movies/Heat (1995)/Heat (1995).mkv");
        assert_eq!(result.title, "Heat");
        assert_eq!(result.year, Some(1995));
        assert!(!result.is_episodic());
    }

    #[test]
    fn test_no_title() {
        assert!(parse_media_path(&PathBuf::from("/")).is_none());
    }

    #[test]
    fn test_show_name_similarity() {
        assert!(show_name_similarity("Chicago Fire", "Chicago Fire") > 0.99);
        assert!(show_name_similarity("The Office", "Office") > 0.9);
        assert!(show_name_similarity("Chicago Fire", "Chicago PD") > 0.5);
    }
}
