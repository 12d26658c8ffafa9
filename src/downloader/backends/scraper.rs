// Scraper backend - public conversion APIs used as a last resort
//
// Both services are undocumented and drift often, so responses are read as
// loose JSON and any surprise is reported as a soft provider failure.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::downloader::errors::DownloadError;
use crate::downloader::extractors::watch_url;
use crate::downloader::format_selector::RawBitrate;
use crate::downloader::models::{QualityTier, ResolvedStream, StreamCandidate};
use crate::downloader::traits::StreamProvider;

const PROVIDER: &str = "scraper";
pub const Y2MATE_BASE: &str = "https://www.y2mate.com";
pub const YT1S_BASE: &str = "https://yt1s.io";

const ANALYZE_TIMEOUT: Duration = Duration::from_secs(20);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);
const YT1S_PREFERENCE: [&str; 4] = ["128", "192", "256", "320"];

pub struct ScraperProvider {
    client: reqwest::Client,
    y2mate_base: String,
    yt1s_base: String,
}

impl ScraperProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, Y2MATE_BASE, YT1S_BASE)
    }

    pub fn with_endpoints(client: reqwest::Client, y2mate_base: &str, yt1s_base: &str) -> Self {
        Self {
            client,
            y2mate_base: y2mate_base.trim_end_matches('/').to_string(),
            yt1s_base: yt1s_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, DownloadError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .header("Accept", "*/*")
            .timeout(timeout)
            .send()
            .await
            .map_err(DownloadError::from_http)?
            .error_for_status()
            .map_err(DownloadError::from_http)?;
        response.json().await.map_err(DownloadError::from_http)
    }

    /// analyze -> pick a `k` token -> convert -> `dlink`
    async fn via_y2mate(&self, video_id: &str) -> Result<StreamCandidate, DownloadError> {
        let query = watch_url(video_id);
        let analyzed = self
            .post_form(
                &format!("{}/mates/analyzeV2/ajax", self.y2mate_base),
                &[("k_query", query.as_str()), ("k_page", "home"), ("hl", "en"), ("q_auto", "0")],
                ANALYZE_TIMEOUT,
            )
            .await?;
        ensure_status_ok(&analyzed, "y2mate analyze")?;

        let links = analyzed["links"]["mp3"]
            .as_object()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| DownloadError::provider(PROVIDER, "y2mate offered no mp3 links"))?;
        let (quality_key, entry) = links
            .get("128")
            .map(|entry| ("128", entry))
            .or_else(|| links.iter().next().map(|(key, entry)| (key.as_str(), entry)))
            .ok_or_else(|| DownloadError::provider(PROVIDER, "y2mate offered no mp3 links"))?;
        let k = entry["k"]
            .as_str()
            .ok_or_else(|| DownloadError::provider(PROVIDER, "y2mate link without k token"))?;

        let converted = self
            .post_form(
                &format!("{}/mates/convertV2/index", self.y2mate_base),
                &[("vid", video_id), ("k", k)],
                CONVERT_TIMEOUT,
            )
            .await?;
        ensure_status_ok(&converted, "y2mate convert")?;

        let dlink = non_empty_str(&converted["dlink"])
            .ok_or_else(|| DownloadError::provider(PROVIDER, "y2mate returned no dlink"))?;

        Ok(self.candidate(dlink, quality_key, "y2mate"))
    }

    async fn via_yt1s(&self, video_id: &str) -> Result<StreamCandidate, DownloadError> {
        let body = serde_json::json!({ "q": watch_url(video_id), "vt": "mp3" });
        let result: Value = self
            .client
            .post(format!("{}/api/ajaxSearch", self.yt1s_base))
            .json(&body)
            .timeout(ANALYZE_TIMEOUT)
            .send()
            .await
            .map_err(DownloadError::from_http)?
            .error_for_status()
            .map_err(DownloadError::from_http)?
            .json()
            .await
            .map_err(DownloadError::from_http)?;
        ensure_status_ok(&result, "yt1s search")?;

        let links = &result["links"]["mp3"];
        YT1S_PREFERENCE
            .iter()
            .find_map(|key| non_empty_str(&links[*key]["url"]).map(|url| (*key, url)))
            .map(|(key, url)| self.candidate(url, key, "yt1s"))
            .ok_or_else(|| DownloadError::provider(PROVIDER, "yt1s offered no mp3 link"))
    }

    fn candidate(&self, url: &str, quality_key: &str, service: &str) -> StreamCandidate {
        StreamCandidate {
            url: url.to_string(),
            bitrate: RawBitrate::from(quality_key).to_bps().saturating_mul(1000),
            format: Some("audio/mpeg".to_string()),
            source: PROVIDER.to_string(),
            instance: Some(service.to_string()),
        }
    }
}

fn ensure_status_ok(body: &Value, step: &str) -> Result<(), DownloadError> {
    match body["status"].as_str() {
        Some("ok") => Ok(()),
        other => Err(DownloadError::provider(
            PROVIDER,
            format!("{} status {:?}", step, other.unwrap_or("missing")),
        )),
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

#[async_trait]
impl StreamProvider for ScraperProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let candidate = match self.via_y2mate(video_id).await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(provider = PROVIDER, instance = "y2mate", error = %e, "conversion API failed");
                self.via_yt1s(video_id).await.inspect_err(|e| {
                    tracing::warn!(provider = PROVIDER, instance = "yt1s", error = %e, "conversion API failed");
                })?
            }
        };

        Ok(ResolvedStream::new(video_id, candidate, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_check() {
        assert!(ensure_status_ok(&json!({"status": "ok"}), "x").is_ok());
        assert!(ensure_status_ok(&json!({"status": "fail"}), "x").is_err());
        assert!(ensure_status_ok(&json!({"mess": "changed schema"}), "x").is_err());
        assert!(ensure_status_ok(&json!([1, 2]), "x").is_err());
    }

    #[test]
    fn test_candidate_bitrate_from_quality_key() {
        let provider = ScraperProvider::new(reqwest::Client::new());
        let candidate = provider.candidate("https://dl/x.mp3", "192", "yt1s");
        assert_eq!(candidate.bitrate, 192_000);
        assert_eq!(candidate.source, "scraper");
        assert_eq!(candidate.instance.as_deref(), Some("yt1s"));

        let unknown = provider.candidate("https://dl/x.mp3", "mp3", "y2mate");
        assert_eq!(unknown.bitrate, 0);

        let absurd = provider.candidate("https://dl/x.mp3", "18446744073709551615", "y2mate");
        assert_eq!(absurd.bitrate, u64::MAX);
    }

    #[test]
    fn test_endpoints_are_trimmed() {
        let provider =
            ScraperProvider::with_endpoints(reqwest::Client::new(), "http://a.test/", "http://b.test//");
        assert_eq!(provider.y2mate_base, "http://a.test");
        assert_eq!(provider.yt1s_base, "http://b.test");
    }
}
