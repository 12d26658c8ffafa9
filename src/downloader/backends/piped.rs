use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::FrontendResponse;
use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{RawBitrate, Rendition};
use crate::downloader::models::{QualityTier, ResolvedStream};
use crate::downloader::traits::StreamProvider;
use crate::downloader::utils::get_json;

const PROVIDER: &str = "piped";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStreams {
    title: Option<String>,
    duration: Option<f64>,
    audio_streams: Option<Vec<PipedAudioStream>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedAudioStream {
    url: Option<String>,
    bitrate: Option<RawBitrate>,
    mime_type: Option<String>,
}

impl From<PipedStreams> for FrontendResponse {
    fn from(body: PipedStreams) -> Self {
        let renditions = body
            .audio_streams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| {
                let url = s.url.filter(|u| !u.is_empty())?;
                Some(Rendition {
                    url,
                    bitrate: s.bitrate,
                    mime_type: s.mime_type,
                })
            })
            .collect();

        Self {
            title: body.title,
            duration_seconds: body.duration.filter(|d| *d >= 0.0).map(|d| d as u64),
            renditions,
        }
    }
}

/// Piped API frontend: `GET {instance}/streams/{id}`
pub struct PipedProvider {
    client: reqwest::Client,
    instances: Vec<String>,
    target_bitrate: u64,
    timeout: Duration,
}

impl PipedProvider {
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

    async fn query_instance(
        &self,
        instance: &str,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let url = format!("{}/streams/{}", instance, video_id);
        let body: PipedStreams = get_json(&self.client, &url, self.timeout).await?;
        FrontendResponse::from(body).into_resolved(
            PROVIDER,
            instance,
            video_id,
            quality,
            self.target_bitrate,
        )
    }
}

#[async_trait]
impl StreamProvider for PipedProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let mut last_error = None;

        for instance in &self.instances {
            tracing::debug!(provider = PROVIDER, instance = %instance, video_id, "querying instance");
            match self.query_instance(instance, video_id, quality).await {
                Ok(resolved) => return Ok(resolved),
                Err(e) => {
                    tracing::warn!(provider = PROVIDER, instance = %instance, error = %e, "instance failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => DownloadError::provider(PROVIDER, format!("every instance failed, last: {}", e)),
            None => DownloadError::provider(PROVIDER, "no instances configured"),
        })
    }
}
