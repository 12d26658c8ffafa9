// Resolver cascade with fallback logic
//
// Providers are tried strictly in insertion order; the first success wins and
// later providers are never called. No fan-out.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::identifier::normalize_video_id;
use super::models::{QualityTier, ResolvedStream};
use super::traits::StreamProvider;

#[derive(Clone, Default)]
pub struct ResolverCascade {
    providers: Vec<Arc<dyn StreamProvider>>,
}

impl ResolverCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(providers: Vec<Arc<dyn StreamProvider>>) -> Self {
        Self { providers }
    }

    pub fn add_provider(&mut self, provider: Arc<dyn StreamProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Normalize `input` once, then return the first provider's success
    pub async fn resolve(
        &self,
        input: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let video_id = normalize_video_id(input);

        for provider in &self.providers {
            tracing::debug!(video_id = %video_id, provider = provider.name(), "trying provider");

            match provider.resolve(&video_id, quality).await {
                Ok(resolved) => {
                    tracing::info!(
                        video_id = %video_id,
                        provider = provider.name(),
                        bitrate = resolved.candidate.bitrate,
                        "resolved stream"
                    );
                    return Ok(resolved);
                }
                Err(e) => {
                    tracing::warn!(video_id = %video_id, provider = provider.name(), error = %e, "provider failed");
                }
            }
        }

        tracing::error!(video_id = %video_id, "all providers exhausted");
        Err(DownloadError::AllProvidersExhausted { video_id })
    }
}

#[async_trait]
impl StreamProvider for ResolverCascade {
    fn name(&self) -> &'static str {
        "cascade"
    }

    async fn resolve(
        &self,
        video_id: &str,
        quality: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        ResolverCascade::resolve(self, video_id, quality).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::StreamCandidate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        name: &'static str,
        succeed: bool,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(name: &'static str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    fn cascade_of(providers: &[Arc<FixedProvider>]) -> ResolverCascade {
        let mut cascade = ResolverCascade::new();
        for provider in providers {
            cascade.add_provider(provider.clone());
        }
        cascade
    }

    #[async_trait]
    impl StreamProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn resolve(
            &self,
            video_id: &str,
            quality: QualityTier,
        ) -> Result<ResolvedStream, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(DownloadError::provider(self.name, "stubbed failure"));
            }
            let candidate = StreamCandidate {
                url: format!("https://{}.example/{}", self.name, video_id),
                bitrate: 128_000,
                format: None,
                source: self.name.to_string(),
                instance: None,
            };
            Ok(ResolvedStream::new(video_id, candidate, quality))
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_cascade() {
        let first = FixedProvider::new("first", true);
        let second = FixedProvider::new("second", true);
        let cascade = cascade_of(&[first.clone(), second.clone()]);

        let resolved = cascade.resolve("dQw4w9WgXcQ", QualityTier::Medium).await.unwrap();

        assert_eq!(resolved.source(), "first");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let first = FixedProvider::new("first", false);
        let second = FixedProvider::new("second", true);
        let third = FixedProvider::new("third", true);
        let cascade = cascade_of(&[first, second, third.clone()]);

        let resolved = cascade
            .resolve("https://youtu.be/dQw4w9WgXcQ", QualityTier::Low)
            .await
            .unwrap();

        assert_eq!(resolved.source(), "second");
        assert_eq!(resolved.video_id, "dQw4w9WgXcQ");
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let cascade = cascade_of(&[FixedProvider::new("a", false), FixedProvider::new("b", false)]);
        assert_eq!(cascade.provider_names(), vec!["a", "b"]);

        let err = cascade.resolve("dQw4w9WgXcQ", QualityTier::High).await.unwrap_err();
        assert!(matches!(
            err,
            DownloadError::AllProvidersExhausted { ref video_id } if video_id == "dQw4w9WgXcQ"
        ));

        let empty = ResolverCascade::new();
        assert!(empty.resolve("dQw4w9WgXcQ", QualityTier::High).await.is_err());
    }
}
