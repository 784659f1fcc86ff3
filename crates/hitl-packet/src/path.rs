//! Dotted key paths into nested JSON records
//!
//! Provides [`KeyPath`] for addressing fields such as `keyword.raw_score`
//! inside a packet record without assuming the record is well formed.

use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Pre-split dotted path into a JSON object tree
///
/// # Examples
/// - `["policy_id"]` → `policy_id`
/// - `["keyword", "quality_flags"]` → `keyword.quality_flags`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment, i.e. the record section this path lives in
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Walk `value` segment by segment.
    ///
    /// Any intermediate that is not an object ends the walk as "missing";
    /// this never panics on malformed input. A present `null` leaf counts
    /// as found.
    #[must_use]
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for segment in &self.0 {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Whether the path resolves to a present key in `value`
    #[inline]
    #[must_use]
    pub fn exists_in(&self, value: &Value) -> bool {
        self.resolve(value).is_some()
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else if seg.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

/// Errors related to key paths
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// Path string was empty
    #[error("key path is empty")]
    Empty,

    /// Empty segment in path
    #[error("key path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must be ascii alphanumeric or underscore)")]
    InvalidSegment(String),
}
