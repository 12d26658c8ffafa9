// Metadata lookup - annotates responses with title/duration, never fatal

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::errors::DownloadError;
use super::models::VideoInfo;
use super::traits::{AudioExtractor, MetadataLookup};
use super::utils::get_json;

lazy_static::lazy_static! {
    static ref ISO_DURATION_RE: Regex =
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap();
}

/// `PT4M12S` -> 252; `None` for anything that is not an ISO-8601 duration
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let caps = ISO_DURATION_RE.captures(value.trim())?;

    let mut total: u64 = 0;
    let mut matched = false;
    for (group, unit) in [(1, 86_400u64), (2, 3600), (3, 60), (4, 1)] {
        if let Some(m) = caps.get(group) {
            let count: u64 = m.as_str().parse().ok()?;
            total = total.saturating_add(count.saturating_mul(unit));
            matched = true;
        }
    }
    // a bare `P` or `PT` carries no duration
    matched.then_some(total)
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    #[serde(default)]
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    thumbnails: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl VideoResource {
    fn into_info(self, video_id: &str) -> VideoInfo {
        VideoInfo {
            id: video_id.to_string(),
            title: self.snippet.title,
            duration_seconds: self
                .content_details
                .and_then(|d| d.duration)
                .and_then(|d| parse_iso8601_duration(&d)),
            uploader: self.snippet.channel_title,
            thumbnail: self.snippet.thumbnails["high"]["url"]
                .as_str()
                .map(str::to_string),
            description: self.snippet.description,
            source: "youtube-data-api".to_string(),
        }
    }
}

/// YouTube Data API when a key is configured, otherwise (or on failure) the extractor
pub struct MetadataService {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    timeout: Duration,
    extractor: Arc<dyn AudioExtractor>,
}

impl MetadataService {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        api_base: &str,
        timeout: Duration,
        extractor: Arc<dyn AudioExtractor>,
    ) -> Self {
        Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
            extractor,
        }
    }

    async fn via_data_api(&self, api_key: &str, video_id: &str) -> Result<VideoInfo, DownloadError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/videos", self.api_base),
            &[("part", "snippet,contentDetails"), ("id", video_id), ("key", api_key)],
        )
        .map_err(|e| DownloadError::ParseError(format!("Invalid API base: {}", e)))?;

        let response: VideoListResponse = get_json(&self.client, url.as_str(), self.timeout).await?;
        response
            .items
            .into_iter()
            .next()
            .map(|item| item.into_info(video_id))
            .ok_or_else(|| DownloadError::ParseError(format!("No API item for {}", video_id)))
    }
}

#[async_trait]
impl MetadataLookup for MetadataService {
    async fn video_info(&self, video_id: &str) -> Option<VideoInfo> {
        if let Some(key) = &self.api_key {
            match self.via_data_api(key, video_id).await {
                Ok(info) => return Some(info),
                Err(e) => tracing::warn!(video_id, error = %e, "data API lookup failed"),
            }
        }

        match self.extractor.video_info(video_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(video_id, error = %e, "extractor metadata lookup failed");
                None
            }
        }
    }
}
