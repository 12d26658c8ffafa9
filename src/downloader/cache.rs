// Download/cache manager
//
// Produces at most one local artifact per id and cache period. The filesystem
// is the only index: an artifact is fresh when it is a non-empty file younger
// than the TTL. Misses are serialized per id through the lock registry and
// re-checked under the lock, then the acquisition strategies are tried in
// order, each writing to `{path}.part`. Only a non-empty part file is renamed
// into place, so a failed attempt never leaves anything at the target path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::errors::DownloadError;
use super::identifier::{cache_file_stem, normalize_video_id};
use super::models::{CacheEntry, CacheStats, QualityTier};
use super::traits::{AcquisitionStrategy, AudioExtractor, StreamProvider};
use super::utils::download_to_file;
use crate::config::CacheConfig;

pub const PART_EXTENSION: &str = "part";
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub ttl: Duration,
    pub audio_format: String,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            ttl: config.ttl,
            audio_format: config.audio_format.clone(),
        }
    }
}

/// One async mutex per id, created lazily and never removed
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockRegistry {
    pub fn lock_for(&self, video_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(video_id.to_string()).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve through a provider, then stream the chosen URL to disk
pub struct ResolveAndCopy {
    name: &'static str,
    provider: Arc<dyn StreamProvider>,
    client: reqwest::Client,
    quality: QualityTier,
    timeout: Duration,
}

impl ResolveAndCopy {
    pub fn new(
        name: &'static str,
        provider: Arc<dyn StreamProvider>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            provider,
            client,
            quality: QualityTier::Medium,
            timeout,
        }
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }
}

#[async_trait]
impl AcquisitionStrategy for ResolveAndCopy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn acquire(&self, video_id: &str, destination: &Path) -> Result<(), DownloadError> {
        let resolved = self.provider.resolve(video_id, self.quality).await?;
        tracing::debug!(
            video_id,
            source = resolved.source(),
            bitrate = resolved.candidate.bitrate,
            "copying resolved stream"
        );
        let bytes = download_to_file(&self.client, &resolved.candidate.url, destination, self.timeout).await?;
        tracing::debug!(video_id, bytes, "stream copied");
        Ok(())
    }
}

/// Let the extraction tool download and transcode, then move its output
pub struct ExtractAudio {
    extractor: Arc<dyn AudioExtractor>,
    staging_root: PathBuf,
}

impl ExtractAudio {
    pub fn new(extractor: Arc<dyn AudioExtractor>, staging_root: PathBuf) -> Self {
        Self {
            extractor,
            staging_root,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for ExtractAudio {
    fn name(&self) -> &'static str {
        "extract-audio"
    }

    async fn acquire(&self, video_id: &str, destination: &Path) -> Result<(), DownloadError> {
        let staging = self
            .staging_root
            .join(format!("{}{}", STAGING_PREFIX, cache_file_stem(video_id)));
        let _ = tokio::fs::remove_dir_all(&staging).await;

        let result = match self.extractor.extract_audio(video_id, &staging).await {
            // the tool may pick a different extension; the rename normalizes it
            Ok(produced) => tokio::fs::rename(&produced, destination)
                .await
                .map_err(|source| DownloadError::DownloadWriteFailure {
                    path: destination.to_path_buf(),
                    source,
                }),
            Err(e) => Err(e),
        };

        let _ = tokio::fs::remove_dir_all(&staging).await;
        result
    }
}

/// Default strategy order: cascade, scraper download link, direct extraction
pub fn default_strategies(
    config: &CacheConfig,
    client: &reqwest::Client,
    cascade: Arc<dyn StreamProvider>,
    scraper: Option<Arc<dyn StreamProvider>>,
    extractor: Arc<dyn AudioExtractor>,
) -> Vec<Arc<dyn AcquisitionStrategy>> {
    let mut strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![Arc::new(ResolveAndCopy::new(
        "resolve-cascade",
        cascade,
        client.clone(),
        config.download_timeout,
    ))];

    if let Some(scraper) = scraper {
        strategies.push(Arc::new(ResolveAndCopy::new(
            "scraper-download",
            scraper,
            client.clone(),
            config.download_timeout,
        )));
    }

    strategies.push(Arc::new(ExtractAudio::new(extractor, config.dir.clone())));
    strategies
}

pub struct CacheManager {
    settings: CacheSettings,
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    locks: LockRegistry,
}

impl CacheManager {
    pub fn new(settings: CacheSettings, strategies: Vec<Arc<dyn AcquisitionStrategy>>) -> Self {
        Self {
            settings,
            strategies,
            locks: LockRegistry::default(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// `{dir}/{stem}.{format}` for an already normalized id
    pub fn artifact_path(&self, video_id: &str) -> PathBuf {
        self.settings.dir.join(format!(
            "{}.{}",
            cache_file_stem(video_id),
            self.settings.audio_format
        ))
    }

    async fn ensure_cache_dir(&self) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(&self.settings.dir)
            .await
            .map_err(|source| {
                tracing::error!(dir = %self.settings.dir.display(), error = %source, "cannot create cache dir");
                DownloadError::CacheDirUnavailable {
                    path: self.settings.dir.clone(),
                    source,
                }
            })
    }

    /// mtime of `path` when it holds a fresh artifact
    async fn fresh_mtime(&self, path: &Path) -> Option<SystemTime> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }
        let modified = meta.modified().ok()?;
        // mtime in the future counts as age zero
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        (age < self.settings.ttl).then_some(modified)
    }

    /// Fresh cache entry for `input`, if any; never downloads
    pub async fn lookup(&self, input: &str) -> Option<CacheEntry> {
        let video_id = normalize_video_id(input);
        let path = self.artifact_path(&video_id);
        let modified = self.fresh_mtime(&path).await?;
        Some(CacheEntry {
            video_id,
            path,
            modified,
        })
    }

    /// Return a fresh local artifact for `input`, downloading it if needed
    ///
    /// The locked section runs on its own task, so a caller that goes away
    /// does not cancel a download other callers may be waiting on.
    pub async fn ensure_local_artifact(self: &Arc<Self>, input: &str) -> Result<PathBuf, DownloadError> {
        self.ensure_cache_dir().await?;

        let video_id = normalize_video_id(input);
        let path = self.artifact_path(&video_id);

        if let Some(modified) = self.fresh_mtime(&path).await {
            let age = SystemTime::now().duration_since(modified).unwrap_or_default();
            tracing::info!(video_id = %video_id, age_secs = age.as_secs(), "cache hit");
            return Ok(path);
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.acquire_locked(video_id, path).await })
            .await
            .map_err(|e| DownloadError::Unknown(format!("download task failed: {}", e)))?
    }

    async fn acquire_locked(&self, video_id: String, path: PathBuf) -> Result<PathBuf, DownloadError> {
        let lock = self.locks.lock_for(&video_id);
        let _guard = lock.lock().await;

        if self.fresh_mtime(&path).await.is_some() {
            tracing::debug!(video_id = %video_id, "artifact completed by another caller");
            return Ok(path);
        }

        let part = part_path(&path);
        for strategy in &self.strategies {
            let _ = tokio::fs::remove_file(&part).await;
            tracing::info!(video_id = %video_id, strategy = strategy.name(), "trying acquisition strategy");

            let outcome = match strategy.acquire(&video_id, &part).await {
                Ok(()) => self.promote(&part, &path).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(bytes) => {
                    tracing::info!(
                        video_id = %video_id,
                        strategy = strategy.name(),
                        bytes,
                        "artifact ready"
                    );
                    return Ok(path);
                }
                Err(e) if !e.is_recoverable() => {
                    tracing::error!(video_id = %video_id, strategy = strategy.name(), error = %e, "unrecoverable failure");
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(video_id = %video_id, strategy = strategy.name(), error = %e, "strategy failed");
                }
            }
        }

        let _ = tokio::fs::remove_file(&part).await;
        tracing::error!(video_id = %video_id, "every acquisition strategy failed");
        Err(DownloadError::AcquisitionFailed { video_id })
    }

    /// Move a non-empty part file into place and stamp it with the current time
    async fn promote(&self, part: &Path, path: &Path) -> Result<u64, DownloadError> {
        let size = match tokio::fs::metadata(part).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => return Err(DownloadError::ExecutionError("strategy produced no data".to_string())),
        };

        tokio::fs::rename(part, path)
            .await
            .map_err(|source| DownloadError::DownloadWriteFailure {
                path: path.to_path_buf(),
                source,
            })?;

        let target = path.to_path_buf();
        let touched = tokio::task::spawn_blocking(move || {
            std::fs::File::options()
                .write(true)
                .open(&target)?
                .set_modified(SystemTime::now())
        })
        .await;
        if !matches!(touched, Ok(Ok(()))) {
            tracing::warn!(path = %path.display(), "could not refresh artifact mtime");
        }

        Ok(size)
    }

    /// File count and total size of cached artifacts; empty when the dir is missing
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        let Ok(mut entries) = tokio::fs::read_dir(&self.settings.dir).await else {
            return stats;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !has_extension(&path, &self.settings.audio_format) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    stats.files += 1;
                    stats.total_bytes += meta.len();
                }
            }
        }
        stats
    }
}

pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(PART_EXTENSION);
    PathBuf::from(name)
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
