// Cache janitor - periodic TTL eviction, independent of request traffic

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;

use super::cache::{has_extension, CacheSettings, PART_EXTENSION};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct CacheJanitor {
    settings: CacheSettings,
    interval: Duration,
}

impl CacheJanitor {
    /// `interval` is raised to at least one second
    pub fn new(settings: CacheSettings, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(interval_ms = interval.as_millis() as u64, "cleanup interval too short, using 1s");
        }
        Self {
            settings,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Delete artifacts (and leftover part files) older than the TTL
    ///
    /// Returns how many files were removed. A missing directory is not an error.
    pub async fn sweep(&self) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(&self.settings.dir).await else {
            return 0;
        };

        let now = SystemTime::now();
        let mut expired: Vec<PathBuf> = Vec::new();

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !has_extension(&path, &self.settings.audio_format) && !has_extension(&path, PART_EXTENSION) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > self.settings.ttl {
                expired.push(path);
            }
        }

        let mut removed = 0;
        for path in expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "removed expired cache file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
                }
            }
        }
        removed
    }

    /// Sweep every interval on a background task; the first sweep is one interval in
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let removed = self.sweep().await;
                if removed > 0 {
                    tracing::info!(removed, "cache cleanup finished");
                } else {
                    tracing::debug!("cache cleanup found nothing to remove");
                }
            }
        })
    }
}
