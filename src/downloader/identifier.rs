// Video identifier normalization
//
// Accepts a bare id or any of the common YouTube URL shapes and returns the
// canonical 11-character id. Never fails: unknown input degrades to a guess.

use regex::Regex;

pub const VIDEO_ID_LEN: usize = 11;

lazy_static::lazy_static! {
    static ref CANONICAL_RE: Regex = Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap();
    static ref URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/)([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"youtube\.com/v/([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})").unwrap(),
    ];
}

/// Whether `value` already has the canonical id shape
pub fn is_canonical_video_id(value: &str) -> bool {
    CANONICAL_RE.is_match(value)
}

/// Extract the canonical video id from an id or URL
pub fn normalize_video_id(input: &str) -> String {
    let value = input.trim();
    if value.is_empty() || is_canonical_video_id(value) {
        return value.to_string();
    }

    for pattern in URL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(value) {
            if let Some(id) = caps.get(1) {
                return id.as_str().to_string();
            }
        }
    }

    let chars: Vec<char> = value.chars().collect();
    let start = chars.len().saturating_sub(VIDEO_ID_LEN);
    let guess: String = chars[start..].iter().collect();
    tracing::debug!(input = value, guess = %guess, "no id pattern matched, guessing from suffix");
    guess
}

/// File-system safe stem for a (possibly guessed) id
pub fn cache_file_stem(video_id: &str) -> String {
    let stem: String = video_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_canonical_id_is_unchanged() {
        for id in [ID, "abc-DEF_123", "___________", "-----------"] {
            assert_eq!(normalize_video_id(id), id);
            assert_eq!(normalize_video_id(&normalize_video_id(id)), id);
        }
    }

    #[test]
    fn test_url_shapes() {
        let urls = [
            format!("https://www.youtube.com/watch?v={}", ID),
            format!("https://youtube.com/watch?v={}&t=42s", ID),
            format!("https://www.youtube.com/watch?feature=share&v={}", ID),
            format!("https://music.youtube.com/watch?v={}&list=RD", ID),
            format!("https://m.youtube.com/watch?v={}", ID),
            format!("https://youtu.be/{}", ID),
            format!("https://youtu.be/{}?si=abcdef", ID),
            format!("https://www.youtube.com/embed/{}", ID),
            format!("https://www.youtube.com/v/{}", ID),
            format!("https://www.youtube.com/shorts/{}", ID),
            format!("  {}  ", ID),
        ];

        for url in &urls {
            assert_eq!(normalize_video_id(url), ID, "failed for {}", url);
        }
    }

    #[test]
    fn test_fallback_takes_suffix() {
        assert_eq!(normalize_video_id("something/xyzdQw4w9WgXcQ"), ID);
        assert_eq!(normalize_video_id("short"), "short");
        assert_eq!(normalize_video_id(""), "");
    }

    #[test]
    fn test_cache_file_stem_sanitizes() {
        assert_eq!(cache_file_stem(ID), ID);
        assert_eq!(cache_file_stem("../../etc/x"), "______etc_x");
        assert_eq!(cache_file_stem(""), "_");
    }
}
