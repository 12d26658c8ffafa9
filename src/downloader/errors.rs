// Error types for providers, extractors and the cache manager

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Outbound request or subprocess exceeded its time bound
    #[error("Network timeout: upstream is not responding")]
    NetworkTimeout,

    /// Upstream throttled the request (429, bot detection, etc.)
    #[error("Upstream is throttling requests from this address")]
    BlockedByYouTube,

    /// yt-dlp (or its interpreter) not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Response body or tool output could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Subprocess exited unsuccessfully
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// One adapter could not produce a stream
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },

    /// The adapter answered but offered no usable audio rendition
    #[error("{provider} returned no usable audio rendition")]
    NoRendition { provider: &'static str },

    /// Every adapter in the cascade failed
    #[error("All providers exhausted for {video_id}")]
    AllProvidersExhausted { video_id: String },

    #[error("Failed to write {}: {source}", path.display())]
    DownloadWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache directory {} unavailable: {source}", path.display())]
    CacheDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every acquisition strategy failed; no artifact was produced
    #[error("Failed to prepare audio for {video_id}")]
    AcquisitionFailed { video_id: String },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn provider(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            reason: reason.into(),
        }
    }

    /// Map a transport error, folding timeouts into `NetworkTimeout`
    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkTimeout
        } else {
            Self::Http(err)
        }
    }

    /// Whether another source could still succeed after this failure
    ///
    /// Local disk trouble and a finished acquisition attempt are final; an
    /// exhausted cascade is not, a later strategy may still get the audio.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::DownloadWriteFailure { .. }
                | Self::CacheDirUnavailable { .. }
                | Self::AcquisitionFailed { .. }
        )
    }
}

// Classify raw tool stderr
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("429") || lower.contains("sign in to confirm") || lower.contains("bot") {
            return Self::BlockedByYouTube;
        }

        // a missing binary is reported by spawn; only a wrapper shell says this
        if lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("parse") || lower.contains("json") {
            return Self::ParseError(s);
        }

        if lower.contains("error") {
            return Self::ExecutionError(s);
        }

        Self::Unknown(s)
    }
}
