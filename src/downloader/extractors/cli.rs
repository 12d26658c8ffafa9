// CLI extractor - drives the native `yt-dlp` binary
//
// Three operations are exposed through `AudioExtractor`:
// - `--get-url` for a direct stream URL (android player client)
// - `--dump-json --skip-download` for metadata
// - `--extract-audio` into a staging directory
//
// Extraction starts with the android client, which needs no account. The
// signed-in web client (cookies file) is tried second, and only when the
// diagnosis says cookies may get past the failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::diagnostics::{diagnose_stderr, summarize_stderr, BlockingReason};
use crate::config::{AppConfig, ExtractorConfig};
use crate::downloader::errors::DownloadError;
use crate::downloader::identifier::cache_file_stem;
use crate::downloader::models::VideoInfo;
use crate::downloader::traits::AudioExtractor;
use crate::downloader::utils::run_output_with_timeout;

const EXTRACT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const EXTRACT_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio";
const COOKIES_COPY_NAME: &str = "cookies.txt";

/// Failed run plus what its stderr says about the cause
type ToolFailure = (DownloadError, BlockingReason);

pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={}", video_id)
}

/// yt-dlp binary plus the flags shared by every invocation
#[derive(Debug, Clone)]
pub struct YtDlpCli {
    binary: String,
    tool_timeout: Duration,
    extract_timeout: Duration,
    cookies_file: Option<PathBuf>,
    proxy: Option<String>,
    audio_format: String,
    audio_quality: String,
}

impl YtDlpCli {
    pub fn new(config: &ExtractorConfig, audio_format: &str, proxy: Option<String>) -> Self {
        Self {
            binary: config.binary.clone(),
            tool_timeout: config.tool_timeout,
            extract_timeout: config.extract_timeout,
            cookies_file: config.cookies_file.clone(),
            proxy,
            audio_format: audio_format.to_string(),
            audio_quality: config.audio_quality.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.extractor,
            &config.cache.audio_format,
            config.providers.proxy.clone(),
        )
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Arguments common to lookups: player client and proxy
    fn lookup_args(&self, client: &str) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", client),
        ];
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args
    }

    /// Build the full `--extract-audio` command line
    fn build_extract_args(
        &self,
        video_id: &str,
        output_template: &str,
        client: &str,
        cookies: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--audio-quality".to_string(),
            self.audio_quality.clone(),
        ];

        if let Some(path) = cookies {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args.extend([
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", client),
            "--user-agent".to_string(),
            EXTRACT_USER_AGENT.to_string(),
            "--format".to_string(),
            EXTRACT_FORMAT.to_string(),
        ]);

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push("-o".to_string());
        args.push(output_template.to_string());
        args.push(watch_url(video_id));
        args
    }

    /// Run and return stdout, turning a failed exit into a classified error
    async fn run(&self, args: Vec<String>, timeout: Duration) -> Result<Vec<u8>, DownloadError> {
        self.run_diagnosed(args, timeout).await.map_err(|(e, _)| e)
    }

    /// Like `run`, keeping the stderr diagnosis next to the error
    async fn run_diagnosed(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<u8>, ToolFailure> {
        let output = match run_output_with_timeout(&self.binary, args, timeout).await {
            Ok(output) => output,
            Err(e @ DownloadError::NetworkTimeout) => return Err((e, BlockingReason::NetworkTimeout)),
            Err(e) => return Err((e, BlockingReason::Unknown)),
        };
        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let reason = diagnose_stderr(&stderr);
        tracing::warn!(
            reason = reason.description(),
            detail = summarize_stderr(&stderr).unwrap_or(""),
            "yt-dlp exited with {}",
            output.status
        );
        Err((DownloadError::from(stderr), reason))
    }

    async fn extract_with_client(
        &self,
        video_id: &str,
        output_dir: &Path,
        stem: &str,
        template: &str,
        client: &str,
        cookies: Option<&Path>,
    ) -> Result<PathBuf, ToolFailure> {
        let args = self.build_extract_args(video_id, template, client, cookies);
        tracing::debug!(video_id, client, "running yt-dlp extraction");

        self.run_diagnosed(args, self.extract_timeout).await?;
        self.find_produced_file(output_dir, stem).await.ok_or_else(|| {
            (
                DownloadError::ExecutionError("yt-dlp produced no audio file".to_string()),
                BlockingReason::Unknown,
            )
        })
    }

    /// Copy the cookies file into `dir`; yt-dlp rewrites it on exit
    async fn prepare_cookies(&self, dir: &Path) -> Option<PathBuf> {
        let source = self.cookies_file.as_ref()?;
        if !source.is_file() {
            tracing::warn!(path = %source.display(), "cookies file not found, using android client");
            return None;
        }

        let copy = dir.join(COOKIES_COPY_NAME);
        match tokio::fs::copy(source, &copy).await {
            Ok(_) => Some(copy),
            Err(e) => {
                tracing::warn!(error = %e, "failed to copy cookies file");
                None
            }
        }
    }

    /// Produced artifact in `dir` for `stem`, preferring the requested extension
    async fn find_produced_file(&self, dir: &Path, stem: &str) -> Option<PathBuf> {
        let prefix = format!("{}.", stem);
        let mut entries = tokio::fs::read_dir(dir).await.ok()?;
        let mut found = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let partial = name.ends_with(".part") || name.ends_with(".ytdl");
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && !partial && name.starts_with(&prefix) {
                found.push(entry.path());
            }
        }

        let wanted = self.audio_format.as_str();
        let preferred = found
            .iter()
            .position(|p| p.extension().is_some_and(|e| e == wanted))
            .unwrap_or(0);
        (!found.is_empty()).then(|| found.swap_remove(preferred))
    }
}

fn parse_video_info(stdout: &[u8], video_id: &str) -> Result<VideoInfo, DownloadError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON from yt-dlp: {}", e)))?;
    let text = |key: &str| json[key].as_str().map(str::to_string);

    Ok(VideoInfo {
        id: text("id").unwrap_or_else(|| video_id.to_string()),
        title: text("title"),
        duration_seconds: json["duration"].as_f64().map(|d| d as u64),
        uploader: text("uploader"),
        thumbnail: text("thumbnail"),
        description: text("description"),
        source: "yt-dlp".to_string(),
    })
}

#[async_trait]
impl AudioExtractor for YtDlpCli {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn stream_url(
        &self,
        video_id: &str,
        format_selector: &str,
    ) -> Result<String, DownloadError> {
        let mut args = self.lookup_args("android");
        args.extend([
            "--get-url".to_string(),
            "-f".to_string(),
            format_selector.to_string(),
            watch_url(video_id),
        ]);

        let stdout = self.run(args, self.tool_timeout).await?;
        String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DownloadError::ParseError("yt-dlp printed no URL".to_string()))
    }

    async fn extract_audio(
        &self,
        video_id: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| DownloadError::DownloadWriteFailure {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let stem = cache_file_stem(video_id);
        let template = output_dir
            .join(format!("{}.%(ext)s", stem))
            .to_string_lossy()
            .to_string();

        let cookies = self.prepare_cookies(output_dir).await;

        let (error, reason) = match self
            .extract_with_client(video_id, output_dir, &stem, &template, "android", None)
            .await
        {
            Ok(path) => return Ok(path),
            Err((e @ DownloadError::ToolNotFound(_), _)) => return Err(e),
            Err((e, reason)) if reason.is_permanent() => {
                tracing::info!(video_id, reason = reason.description(), "not retrying extraction");
                return Err(e);
            }
            Err(failure) => failure,
        };

        if !reason.cookies_might_help() {
            return Err(error);
        }
        let Some(cookies) = cookies else {
            tracing::warn!(
                video_id,
                reason = reason.description(),
                "extraction blocked; a cookies file may get past this"
            );
            return Err(error);
        };

        tracing::info!(video_id, reason = reason.description(), "retrying with signed-in web client");
        self.extract_with_client(video_id, output_dir, &stem, &template, "web", Some(cookies.as_path()))
            .await
            .map_err(|(e, _)| e)
    }

    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, DownloadError> {
        let mut args = self.lookup_args("android,web");
        args.extend([
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            watch_url(video_id),
        ]);

        let stdout = self.run(args, self.tool_timeout).await?;
        parse_video_info(&stdout, video_id)
    }
}
