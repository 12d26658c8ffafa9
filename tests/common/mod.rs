//! Shared fixtures: local HTTP upstreams, stub providers and strategies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use youtube_audio_proxy::downloader::backends::FrontendResponse;
use youtube_audio_proxy::downloader::{
    AcquisitionStrategy, AudioExtractor, CacheManager, CacheSettings, DownloadError, QualityTier,
    RawBitrate, Rendition, ResolvedStream, StreamProvider, VideoInfo,
};

pub const VIDEO_ID: &str = "dQw4w9WgXcQ";
pub const TARGET_BPS: u64 = 128_000;

/// Serve `router` on an ephemeral port, returning its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", address)
}

/// Static files under `/files/{name}`
pub async fn spawn_file_server(files: Vec<(&str, Vec<u8>)>) -> String {
    let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(
        files
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), bytes))
            .collect(),
    );

    let router = Router::new()
        .route(
            "/files/{name}",
            get(
                |State(files): State<Arc<HashMap<String, Vec<u8>>>>, UrlPath(name): UrlPath<String>| async move {
                    match files.get(&name) {
                        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
                        None => StatusCode::NOT_FOUND.into_response(),
                    }
                },
            ),
        )
        .with_state(files);

    serve(router).await
}

/// Fake audio payload whose content identifies the bitrate it stands for
pub fn payload_for(bitrate: u64) -> Vec<u8> {
    format!("ID3 fake audio at {} bps", bitrate).into_bytes()
}

/// Renditions pointing at a file server that hosts `payload_for` each bitrate
pub async fn renditions_with_server(bitrates: &[u64]) -> Vec<Rendition> {
    let files = bitrates
        .iter()
        .map(|b| (Box::leak(b.to_string().into_boxed_str()) as &str, payload_for(*b)))
        .collect();
    let base = spawn_file_server(files).await;

    bitrates
        .iter()
        .map(|b| Rendition {
            url: format!("{}/files/{}", base, b),
            bitrate: Some(RawBitrate::from(*b)),
            mime_type: Some("audio/mpeg".to_string()),
        })
        .collect()
}

/// Provider answering from a fixed rendition set, or failing when it has none
pub struct StubProvider {
    name: &'static str,
    renditions: Option<Vec<Rendition>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn succeeding(name: &'static str, renditions: Vec<Rendition>) -> Arc<Self> {
        Arc::new(Self {
            name,
            renditions: Some(renditions),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            renditions: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(renditions) = &self.renditions else {
            return Err(DownloadError::provider(self.name, "stubbed outage"));
        };

        FrontendResponse {
            title: Some("Stub title".to_string()),
            duration_seconds: Some(212),
            renditions: renditions.clone(),
        }
        .into_resolved(self.name, "stub-instance", video_id, quality, TARGET_BPS)
    }
}

/// Writes `payload` after `delay`, counting invocations
pub struct CountingStrategy {
    calls: AtomicUsize,
    delay: Duration,
    payload: Vec<u8>,
}

impl CountingStrategy {
    pub fn new(delay: Duration, payload: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            payload: payload.to_vec(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionStrategy for CountingStrategy {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn acquire(&self, _video_id: &str, destination: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        tokio::fs::write(destination, &self.payload)
            .await
            .map_err(|source| DownloadError::DownloadWriteFailure {
                path: destination.to_path_buf(),
                source,
            })
    }
}

/// Always fails, optionally leaving a partial file behind
pub struct FailingStrategy {
    calls: AtomicUsize,
    leave_partial: bool,
}

impl FailingStrategy {
    pub fn new(leave_partial: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            leave_partial,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionStrategy for FailingStrategy {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn acquire(&self, _video_id: &str, destination: &Path) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.leave_partial {
            let _ = tokio::fs::write(destination, b"truncated").await;
        }
        Err(DownloadError::provider("stub", "connection reset"))
    }
}

/// Extraction tool double: writes `{stem}.{ext}` into the output dir, or fails
pub struct StubExtractor {
    pub produced_ext: Option<&'static str>,
}

#[async_trait]
impl AudioExtractor for StubExtractor {
    fn name(&self) -> &'static str {
        "stub-extractor"
    }

    async fn stream_url(&self, _: &str, _: &str) -> Result<String, DownloadError> {
        Err(DownloadError::ToolNotFound("stub".to_string()))
    }

    async fn extract_audio(&self, video_id: &str, output_dir: &Path) -> Result<PathBuf, DownloadError> {
        let Some(ext) = self.produced_ext else {
            return Err(DownloadError::ExecutionError("ERROR: Video unavailable".to_string()));
        };
        tokio::fs::create_dir_all(output_dir).await.unwrap();
        let produced = output_dir.join(format!("{}.{}", video_id, ext));
        tokio::fs::write(&produced, b"extracted audio").await.unwrap();
        Ok(produced)
    }

    async fn video_info(&self, video_id: &str) -> Result<VideoInfo, DownloadError> {
        Ok(VideoInfo {
            id: video_id.to_string(),
            title: Some("Stub title".to_string()),
            duration_seconds: Some(212),
            source: "stub".to_string(),
            ..VideoInfo::default()
        })
    }
}

pub fn settings(dir: &Path, ttl: Duration) -> CacheSettings {
    CacheSettings {
        dir: dir.to_path_buf(),
        ttl,
        audio_format: "mp3".to_string(),
    }
}

pub fn manager(
    dir: &Path,
    ttl: Duration,
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
) -> Arc<CacheManager> {
    Arc::new(CacheManager::new(settings(dir, ttl), strategies))
}

/// Backdate (or future-date) a file's mtime
pub fn set_age(path: &Path, age: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}
