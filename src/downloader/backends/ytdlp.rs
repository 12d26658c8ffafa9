use std::sync::Arc;

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{QualityTier, ResolvedStream, StreamCandidate};
use crate::downloader::traits::{AudioExtractor, StreamProvider};

const PROVIDER: &str = "yt-dlp";

/// Direct extraction through the external tool; the URL it prints is used as-is
pub struct YtDlpProvider {
    extractor: Arc<dyn AudioExtractor>,
}

impl YtDlpProvider {
    pub fn new(extractor: Arc<dyn AudioExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl StreamProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let selector = FormatSelector::get_format_spec(quality);
        let url = self.extractor.stream_url(video_id, selector).await?;

        // title and duration are nice-to-have
        let info = match self.extractor.video_info(video_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(video_id, error = %e, "yt-dlp metadata lookup failed");
                None
            }
        };

        let candidate = StreamCandidate {
            url,
            bitrate: 0,
            format: None,
            source: PROVIDER.to_string(),
            instance: Some(self.extractor.name().to_string()),
        };
        let (title, duration) = info
            .map(|i| (i.title, i.duration_seconds))
            .unwrap_or_default();

        Ok(ResolvedStream::new(video_id, candidate, quality)
            .with_title(title)
            .with_duration(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::VideoInfo;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExtractor {
        selectors: Mutex<Vec<String>>,
        info_fails: bool,
    }

    #[async_trait]
    impl AudioExtractor for RecordingExtractor {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn stream_url(
            &self,
            video_id: &str,
            format_selector: &str,
        ) -> Result<String, DownloadError> {
            self.selectors.lock().unwrap().push(format_selector.to_string());
            Ok(format!("https://rr1.googlevideo.test/{}", video_id))
        }

        async fn extract_audio(&self, _: &str, _: &Path) -> Result<PathBuf, DownloadError> {
            Err(DownloadError::Unknown("not used".to_string()))
        }

        async fn video_info(&self, video_id: &str) -> Result<VideoInfo, DownloadError> {
            if self.info_fails {
                return Err(DownloadError::NetworkTimeout);
            }
            Ok(VideoInfo {
                id: video_id.to_string(),
                title: Some("Title".to_string()),
                duration_seconds: Some(212),
                source: "recording".to_string(),
                ..VideoInfo::default()
            })
        }
    }

    #[tokio::test]
    async fn test_medium_uses_capped_selector() {
        let extractor = Arc::new(RecordingExtractor::default());
        let provider = YtDlpProvider::new(extractor.clone());

        let resolved = provider.resolve("dQw4w9WgXcQ", QualityTier::Medium).await.unwrap();

        assert_eq!(
            extractor.selectors.lock().unwrap().as_slice(),
            ["bestaudio[abr<=160]/bestaudio"]
        );
        assert_eq!(resolved.candidate.url, "https://rr1.googlevideo.test/dQw4w9WgXcQ");
        assert_eq!(resolved.title.as_deref(), Some("Title"));
        assert_eq!(resolved.duration_seconds, Some(212));
        assert_eq!(resolved.source(), "yt-dlp");
    }

    #[tokio::test]
    async fn test_metadata_failure_is_not_fatal() {
        let extractor = Arc::new(RecordingExtractor {
            info_fails: true,
            ..RecordingExtractor::default()
        });
        let provider = YtDlpProvider::new(extractor);

        let resolved = provider.resolve("dQw4w9WgXcQ", QualityTier::High).await.unwrap();
        assert!(resolved.title.is_none());
        assert!(resolved.duration_seconds.is_none());
    }
}
