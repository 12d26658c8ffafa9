pub mod config;
pub mod downloader;
pub mod logging;
pub mod server;

use std::sync::Arc;

use anyhow::Context;

pub use config::AppConfig;
pub use server::{router, AppState};

use downloader::backends::{self, ScraperProvider};
use downloader::cache::{self, CacheManager, CacheSettings};
use downloader::tools::ToolInfo;
use downloader::utils::build_http_client;
use downloader::{
    AudioExtractor, CacheJanitor, DownloadError, MetadataService, ResolverCascade, StreamProvider, YtDlpCli,
};

/// Wire providers, strategies and the cache manager from configuration
pub fn build_app_state(config: &AppConfig) -> Result<AppState, DownloadError> {
    let providers = &config.providers;
    let client = build_http_client(&providers.user_agent, providers.proxy.as_deref())?;
    let extractor: Arc<dyn AudioExtractor> = Arc::new(YtDlpCli::from_config(config));

    let cascade: Arc<dyn StreamProvider> = Arc::new(ResolverCascade::with_providers(
        backends::default_providers(providers, &client, extractor.clone()),
    ));
    let scraper: Option<Arc<dyn StreamProvider>> = if providers.scraper_enabled {
        Some(Arc::new(ScraperProvider::new(client.clone())))
    } else {
        None
    };

    let strategies = cache::default_strategies(&config.cache, &client, cascade, scraper, extractor.clone());
    let cache = Arc::new(CacheManager::new(CacheSettings::from(&config.cache), strategies));

    let metadata = Arc::new(MetadataService::new(
        client,
        providers.api_key.clone(),
        &providers.api_base,
        providers.http_timeout,
        extractor,
    ));

    Ok(AppState {
        cache,
        metadata,
        public_base_url: config.server.public_base_url.clone(),
    })
}

/// Start the janitor and serve until interrupted
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = build_app_state(&config).context("failed to build application state")?;

    let ytdlp = ToolInfo::probe(&config.extractor.binary).await;
    if ytdlp.is_available {
        tracing::info!(path = ?ytdlp.path, version = ?ytdlp.version, "yt-dlp available");
    } else {
        tracing::warn!(binary = %config.extractor.binary, "yt-dlp not found; direct extraction will fail");
    }

    let janitor = CacheJanitor::new(CacheSettings::from(&config.cache), config.cache.cleanup_interval).spawn();

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;

    tracing::info!(
        address = %address,
        cache_dir = %config.cache.dir.display(),
        format = %config.cache.audio_format,
        ttl_secs = config.cache.ttl.as_secs(),
        "audio proxy listening"
    );

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    janitor.abort();
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
