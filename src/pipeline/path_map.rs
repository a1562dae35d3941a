//! Path translation from media-server paths to locally mounted paths
//!
//! Rules are tried in declaration order and the first whose server prefix
//! occurs in the raw path wins. Substitution is plain substring replacement,
//! so a prefix that recurs deeper in the path is rewritten there as well.
//! Nothing here touches the filesystem.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One `serverPrefix -> localPrefix` rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapRule {
    pub server_prefix: String,
    pub local_prefix: String,
}

impl PathMapRule {
    pub fn new(server_prefix: impl Into<String>, local_prefix: impl Into<String>) -> Self {
        Self {
            server_prefix: server_prefix.into(),
            local_prefix: local_prefix.into(),
        }
    }

    fn matches(&self, raw: &str) -> bool {
        raw.contains(&self.server_prefix)
    }

    fn apply(&self, raw: &str) -> String {
        raw.replace(&self.server_prefix, &self.local_prefix)
    }
}

impl FromStr for PathMapRule {
    type Err = PipelineError;

    /// Parse `serverPrefix:localPrefix`.
    ///
    /// A leading drive letter (`D:`) on either side is kept with its side, so
    /// `D:\media:/mnt/media` and `X::Y:` both split where expected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = separator_index(s).ok_or_else(|| {
            PipelineError::configuration(
                "path_mappings",
                format!("rule '{}' is not of the form serverPrefix:localPrefix", s),
            )
        })?;

        let (server, local) = (&s[..split], &s[split + 1..]);
        if server.is_empty() {
            return Err(PipelineError::configuration(
                "path_mappings",
                format!("rule '{}' has an empty server prefix", s),
            ));
        }

        Ok(Self::new(server, local))
    }
}

/// Index of the `:` separating the two halves, skipping a drive-letter colon
fn separator_index(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let is_drive = |i: usize| i == 1 && bytes[0].is_ascii_alphabetic();

    s.char_indices()
        .filter(|(_, c)| *c == ':')
        .map(|(i, _)| i)
        .find(|&i| !is_drive(i))
}

/// Parse a list of rules separated by `;` or newlines, skipping blank entries
pub fn parse_rules(spec: &str) -> Result<Vec<PathMapRule>, PipelineError> {
    spec.split(['\n', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

/// Ordered rule table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMapper {
    rules: Vec<PathMapRule>,
}

impl PathMapper {
    pub fn new(rules: Vec<PathMapRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PathMapRule] {
        &self.rules
    }

    pub fn resolve(&self, raw_path: Option<&str>) -> Option<String> {
        resolve(raw_path, &self.rules)
    }
}

/// Translate `raw_path` with the first matching rule.
///
/// `None` in, `None` out. Backslashes are normalized to `/` only when a rule
/// applied; unmatched paths come back exactly as given.
pub fn resolve(raw_path: Option<&str>, rules: &[PathMapRule]) -> Option<String> {
    let raw = raw_path?;
    match rules.iter().find(|rule| rule.matches(raw)) {
        Some(rule) => Some(rule.apply(raw).replace('\\', "/")),
        None => Some(raw.to_string()),
    }
}
