// FormatSelector - picks one audio rendition for a quality tier
//
// Providers report bitrates either as integers (Piped) or as strings with an
// optional unit suffix (Invidious: "128k", "131550"). Everything is normalized
// to bits per second before sorting so selection is deterministic.

use serde::Deserialize;

use super::models::QualityTier;

/// Bitrate as reported upstream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawBitrate {
    Number(f64),
    Text(String),
}

impl RawBitrate {
    /// Bits per second; 0 if unparseable
    pub fn to_bps(&self) -> u64 {
        match self {
            Self::Number(n) if n.is_finite() && *n > 0.0 => *n as u64,
            Self::Number(_) => 0,
            Self::Text(s) => {
                let digits: String = s
                    .trim_start_matches(|c: char| !c.is_ascii_digit())
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                let Ok(number) = digits.parse::<u64>() else {
                    return 0;
                };
                if s.trim().to_lowercase().ends_with('k') {
                    number.saturating_mul(1000)
                } else {
                    number
                }
            }
        }
    }
}

impl From<u64> for RawBitrate {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for RawBitrate {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub fn normalize_bitrate(raw: Option<&RawBitrate>) -> u64 {
    raw.map_or(0, RawBitrate::to_bps)
}

/// One audio rendition from a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub url: String,
    pub bitrate: Option<RawBitrate>,
    pub mime_type: Option<String>,
}

impl Rendition {
    pub fn bitrate_bps(&self) -> u64 {
        normalize_bitrate(self.bitrate.as_ref())
    }
}

/// Format selector for audio renditions
pub struct FormatSelector;

impl FormatSelector {
    /// Pick a rendition for `quality`; `None` when the set is empty
    pub fn select(
        renditions: &[Rendition],
        quality: QualityTier,
        target_bps: u64,
    ) -> Option<&Rendition> {
        let mut ordered: Vec<&Rendition> = renditions.iter().collect();
        // stable: equal bitrates keep upstream order
        ordered.sort_by_key(|r| r.bitrate_bps());

        match quality {
            QualityTier::High => ordered.last().copied(),
            QualityTier::Low => ordered.first().copied(),
            QualityTier::Medium => ordered
                .into_iter()
                .min_by_key(|r| r.bitrate_bps().abs_diff(target_bps)),
        }
    }

    /// yt-dlp format selector matching a quality tier
    pub fn get_format_spec(quality: QualityTier) -> &'static str {
        match quality {
            QualityTier::Low => "worstaudio/bestaudio",
            QualityTier::Medium => "bestaudio[abr<=160]/bestaudio",
            QualityTier::High => "bestaudio/best",
        }
    }
}
