// Diagnostics for yt-dlp failures
//
// Classifies stderr into a blocking reason so the extractor can log something
// actionable and stop cycling player clients when nothing will help.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    Http403Forbidden,
    /// Streaming protocol not supported by the chosen player client
    SabrStreaming,
    /// Proof of Origin token required
    PoTokenRequired,
    AgeRestricted,
    GeoBlocked,
    NetworkTimeout,
    RateLimited,
    BotDetection,
    PrivateVideo,
    VideoUnavailable,
    DrmProtected,
    MembersOnly,
    Unknown,
}

impl BlockingReason {
    /// Nothing on our side can get past these
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DrmProtected | Self::VideoUnavailable | Self::PrivateVideo
        )
    }

    /// A signed-in web client (cookies file) may succeed where android failed
    ///
    /// Unrecognised failures get the retry too; network and regional problems
    /// do not change with a different client.
    pub fn cookies_might_help(&self) -> bool {
        matches!(
            self,
            Self::AgeRestricted
                | Self::BotDetection
                | Self::PoTokenRequired
                | Self::MembersOnly
                | Self::Http403Forbidden
                | Self::SabrStreaming
                | Self::Unknown
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "access denied (HTTP 403)",
            Self::SabrStreaming => "SABR streaming forced for this client",
            Self::PoTokenRequired => "PO token required",
            Self::AgeRestricted => "age-restricted",
            Self::GeoBlocked => "not available in this region",
            Self::NetworkTimeout => "network timeout",
            Self::RateLimited => "rate limited",
            Self::BotDetection => "bot detection triggered",
            Self::PrivateVideo => "private video",
            Self::VideoUnavailable => "video unavailable",
            Self::DrmProtected => "DRM-protected",
            Self::MembersOnly => "members-only",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify yt-dlp stderr; most specific patterns are checked first
pub fn diagnose_stderr(stderr: &str) -> BlockingReason {
    let lower = stderr.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["drm", "widevine", "playready", "requires purchase", "rental"]) {
        BlockingReason::DrmProtected
    } else if has(&["members only", "members-only", "join this channel", "available to members"]) {
        BlockingReason::MembersOnly
    } else if has(&["sabr"]) {
        BlockingReason::SabrStreaming
    } else if has(&["po token", "proof of origin"]) {
        BlockingReason::PoTokenRequired
    } else if has(&["age-restricted", "confirm your age"]) {
        BlockingReason::AgeRestricted
    } else if has(&["private video", "video is private"]) {
        BlockingReason::PrivateVideo
    } else if has(&["video unavailable", "has been removed", "no longer available"]) {
        BlockingReason::VideoUnavailable
    } else if has(&["not available in your country", "blocked in your country"]) {
        BlockingReason::GeoBlocked
    } else if has(&["429", "rate limit", "too many requests"]) {
        BlockingReason::RateLimited
    } else if has(&["not a bot", "captcha", "unusual traffic"]) {
        BlockingReason::BotDetection
    } else if has(&["403", "forbidden"]) {
        BlockingReason::Http403Forbidden
    } else if has(&["timed out", "timeout", "connection refused", "network unreachable"]) {
        BlockingReason::NetworkTimeout
    } else {
        BlockingReason::Unknown
    }
}

/// First `ERROR:` line, or the last non-empty line, for compact logging
pub fn summarize_stderr(stderr: &str) -> Option<&str> {
    let lines = || stderr.lines().map(str::trim).filter(|l| !l.is_empty());
    lines()
        .find(|l| l.to_lowercase().starts_with("error:"))
        .or_else(|| lines().last())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_failures() {
        let cases = [
            ("ERROR: HTTP Error 403: Forbidden", BlockingReason::Http403Forbidden),
            ("YouTube is forcing SABR streaming for this client", BlockingReason::SabrStreaming),
            ("android client https formats require a GVS PO Token", BlockingReason::PoTokenRequired),
            ("ERROR: Sign in to confirm your age", BlockingReason::AgeRestricted),
            ("ERROR: Sign in to confirm you're not a bot", BlockingReason::BotDetection),
            ("HTTP Error 429: Too Many Requests", BlockingReason::RateLimited),
            ("The uploader has not made this video available in your country", BlockingReason::GeoBlocked),
            ("ERROR: [youtube] abc: Video unavailable", BlockingReason::VideoUnavailable),
            ("This video is DRM protected", BlockingReason::DrmProtected),
            ("Read timed out", BlockingReason::NetworkTimeout),
            ("something else entirely", BlockingReason::Unknown),
            ("ERROR: unable to download video data: HTTP Error 404: Not Found", BlockingReason::Unknown),
        ];

        for (stderr, expected) in cases {
            assert_eq!(diagnose_stderr(stderr), expected, "for {:?}", stderr);
        }
    }

    #[test]
    fn test_permanent_reasons_do_not_suggest_cookies() {
        for reason in [BlockingReason::DrmProtected, BlockingReason::VideoUnavailable] {
            assert!(reason.is_permanent());
            assert!(!reason.cookies_might_help());
        }
        assert!(BlockingReason::BotDetection.cookies_might_help());
        assert!(BlockingReason::Unknown.cookies_might_help());
        assert!(!BlockingReason::NetworkTimeout.cookies_might_help());
        assert!(!BlockingReason::GeoBlocked.cookies_might_help());
        assert!(!BlockingReason::NetworkTimeout.is_permanent());
    }

    #[test]
    fn test_summarize_prefers_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] x: Video unavailable\nmore\n";
        assert_eq!(
            summarize_stderr(stderr),
            Some("ERROR: [youtube] x: Video unavailable")
        );
        assert_eq!(summarize_stderr("a\nb\n\n"), Some("b"));
        assert_eq!(summarize_stderr("   "), None);
    }
}
