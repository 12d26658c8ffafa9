use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::FrontendResponse;
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{RawBitrate, Rendition};
use crate::downloader::models::{QualityTier, ResolvedStream};
use crate::downloader::traits::StreamProvider;
use crate::downloader::utils::get_json;

const PROVIDER: &str = "invidious";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousVideo {
    title: Option<String>,
    length_seconds: Option<f64>,
    adaptive_formats: Option<Vec<AdaptiveFormat>>,
}

#[derive(Debug, Deserialize)]
struct AdaptiveFormat {
    url: Option<String>,
    /// Usually a string such as "131550" or "128k"
    bitrate: Option<RawBitrate>,
    #[serde(rename = "type")]
    mime_type: Option<String>,
}

impl From<InvidiousVideo> for FrontendResponse {
    fn from(body: InvidiousVideo) -> Self {
        let renditions = body
            .adaptive_formats
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f.mime_type.as_deref().is_some_and(|t| t.starts_with("audio")))
            .filter_map(|f| {
                let url = f.url.filter(|u| !u.is_empty())?;
                Some(Rendition {
                    url,
                    bitrate: f.bitrate,
                    mime_type: f.mime_type,
                })
            })
            .collect();

        Self {
            title: body.title,
            duration_seconds: body.length_seconds.filter(|d| *d >= 0.0).map(|d| d as u64),
            renditions,
        }
    }
}

/// Invidious API frontend: `GET {instance}/api/v1/videos/{id}`
pub struct InvidiousProvider {
    client: reqwest::Client,
    instances: Vec<String>,
    target_bitrate: u64,
    timeout: Duration,
}

impl InvidiousProvider {
    pub fn new(
        client: reqwest::Client,
        instances: Vec<String>,
        target_bitrate: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            instances,
            target_bitrate,
            timeout,
        }
    }
}

#[async_trait]
impl StreamProvider for InvidiousProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        if self.instances.is_empty() {
            return Err(DownloadError::provider(PROVIDER, "no instances configured"));
        }

        let mut failures = 0;
        for instance in &self.instances {
            let url = format!("{}/api/v1/videos/{}", instance, video_id);
            tracing::debug!(provider = PROVIDER, instance = %instance, video_id, "querying instance");

            let result = match get_json::<InvidiousVideo>(&self.client, &url, self.timeout).await {
                Ok(body) => FrontendResponse::from(body).into_resolved(
                    PROVIDER,
                    instance,
                    video_id,
                    quality,
                    self.target_bitrate,
                ),
                Err(e) => Err(e),
            };

            match result {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(provider = PROVIDER, instance = %instance, error = %e, "instance failed");
                }
            }
        }

        Err(DownloadError::provider(
            PROVIDER,
            format!("{} instance(s) failed", failures),
        ))
    }
}
