// Capability traits: providers, extraction tool, acquisition strategies

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{QualityTier, ResolvedStream, VideoInfo};

/// Resolves a video id to a playable audio stream
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Name of the provider (for logging and the source tag)
    fn name(&self) -> &'static str;

    /// Resolve a normalized id; never retries internally
    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError>;
}

/// External extraction tool (yt-dlp or compatible)
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Direct stream URL for `format_selector`
    async fn stream_url(&self, video_id: &str, format_selector: &str)
        -> Result<String, DownloadError>;

    /// Download and transcode into `output_dir`, returning the produced file
    async fn extract_audio(
        &self,
        video_id: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, DownloadError>;

    /// Metadata without downloading media
    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, DownloadError>;
}

/// One way of producing a cache artifact
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the complete artifact to `destination`
    async fn acquire(&self, video_id: &str, destination: &Path) -> Result<(), DownloadError>;
}

/// Metadata lookup used to annotate responses; failure is non-fatal
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn video_info(&self, video_id: &str) -> Option<VideoInfo>;
}
