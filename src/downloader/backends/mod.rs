// Stream providers, in default cascade order

pub mod invidious;
pub mod piped;
pub mod scraper;
pub mod ytdlp;

use std::sync::Arc;

pub use invidious::InvidiousProvider;
pub use piped::PipedProvider;
pub use scraper::ScraperProvider;
pub use ytdlp::YtDlpProvider;

use super::errors::DownloadError;
use super::format_selector::{FormatSelector, Rendition};
use super::models::{QualityTier, ResolvedStream, StreamCandidate};
use super::traits::{AudioExtractor, StreamProvider};
use crate::config::ProviderConfig;

/// Provider-neutral view of one frontend answer
#[derive(Debug, Clone, Default)]
pub struct FrontendResponse {
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    /// Audio renditions that carry a URL
    pub renditions: Vec<Rendition>,
}

impl FrontendResponse {
    /// Pick a rendition and wrap it; `NoRendition` when nothing is usable
    pub fn into_resolved(
        self,
        provider: &'static str,
        instance: &str,
        video_id: &str,
        quality: QualityTier,
        target_bitrate: u64,
    ) -> Result<ResolvedStream, DownloadError> {
        let chosen = FormatSelector::select(&self.renditions, quality, target_bitrate)
            .ok_or(DownloadError::NoRendition { provider })?;

        let candidate = StreamCandidate {
            url: chosen.url.clone(),
            bitrate: chosen.bitrate_bps(),
            format: chosen.mime_type.clone(),
            source: provider.to_string(),
            instance: Some(instance.to_string()),
        };

        Ok(ResolvedStream::new(video_id, candidate, quality)
            .with_title(self.title)
            .with_duration(self.duration_seconds))
    }
}

/// piped, invidious, scraper (unless disabled), yt-dlp
pub fn default_providers(
    config: &ProviderConfig,
    client: &reqwest::Client,
    extractor: Arc<dyn AudioExtractor>,
) -> Vec<Arc<dyn StreamProvider>> {
    let mut providers: Vec<Arc<dyn StreamProvider>> = vec![
        Arc::new(PipedProvider::new(
            client.clone(),
            config.piped_instances.clone(),
            config.target_bitrate,
            config.http_timeout,
        )),
        Arc::new(InvidiousProvider::new(
            client.clone(),
            config.invidious_instances.clone(),
            config.target_bitrate,
            config.http_timeout,
        )),
    ];

    if config.scraper_enabled {
        providers.push(Arc::new(ScraperProvider::new(client.clone())));
    }
    providers.push(Arc::new(YtDlpProvider::new(extractor)));
    providers
}
