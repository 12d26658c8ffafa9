// Common data models for the resolver and cache

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Caller-requested audio quality preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    /// Closest to the configured target bitrate ("esp32" maps here)
    #[default]
    Medium,
    High,
}

impl QualityTier {
    /// Lenient parse: unknown values fall back to `Medium`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" | "best" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl FromStr for QualityTier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One playable audio URL offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    /// Bits per second, 0 when unknown
    pub bitrate: u64,
    /// Mime type or container tag as reported upstream
    pub format: Option<String>,
    /// Provider name (`piped`, `invidious`, ...)
    pub source: String,
    /// Instance base URL or endpoint that answered
    pub instance: Option<String>,
}

/// Result of a successful resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub video_id: String,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub candidate: StreamCandidate,
    pub quality: QualityTier,
    #[serde(with = "time::serde::rfc3339")]
    pub resolved_at: OffsetDateTime,
}

impl ResolvedStream {
    pub fn new(video_id: &str, candidate: StreamCandidate, quality: QualityTier) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: None,
            duration_seconds: None,
            candidate,
            quality,
            resolved_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_duration(mut self, seconds: Option<u64>) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn source(&self) -> &str {
        &self.candidate.source
    }
}

/// Lightweight video metadata used to annotate responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    /// Where the metadata came from
    pub source: String,
}

/// A cached artifact, as seen on the filesystem
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub video_id: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Aggregate cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub files: usize,
    pub total_bytes: u64,
}

impl CacheStats {
    pub fn megabytes(&self) -> f64 {
        (self.total_bytes as f64 / 1e6 * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_tier_parsing() {
        assert_eq!(QualityTier::parse("low"), QualityTier::Low);
        assert_eq!(QualityTier::parse("HIGH"), QualityTier::High);
        assert_eq!(QualityTier::parse("best"), QualityTier::High);
        assert_eq!(QualityTier::parse("esp32"), QualityTier::Medium);
        assert_eq!(QualityTier::parse("medium"), QualityTier::Medium);
        assert_eq!(QualityTier::parse("whatever"), QualityTier::Medium);
    }

    #[test]
    fn test_cache_stats_megabytes() {
        let stats = CacheStats {
            files: 2,
            total_bytes: 3_456_789,
        };
        assert_eq!(stats.megabytes(), 3.46);
    }
}
