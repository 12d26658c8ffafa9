//! Runtime configuration for the audio proxy.
//!
//! Every tunable is read once at startup from environment-style variables and
//! shared immutably afterwards. Unparseable values fall back to the default
//! with a warning instead of aborting startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::tools;

pub const DEFAULT_PIPED_INSTANCES: &str =
    "https://pipedapi.kavin.rocks,https://pipedapi.moomoo.me,https://pipedapi.tokhmi.xyz";

pub const DEFAULT_INVIDIOUS_INSTANCES: &str = "https://inv.nadeko.net,https://invidious.snopyta.org,\
https://invidious.osi.kr,https://y.com.sb,https://inv.riverside.rocks";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 12; Pixel 5 Build/SPB3.210618.013; wv) \
AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/94.0.4606.61 Mobile Safari/537.36";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Top-level configuration, grouped by concern.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub providers: ProviderConfig,
    pub extractor: ExtractorConfig,
    pub server: ServerConfig,
}

/// On-disk cache behaviour.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Artifacts younger than this are served without re-downloading
    pub ttl: Duration,
    /// Period of the janitor sweep
    pub cleanup_interval: Duration,
    /// Extension of cached artifacts, also the requested transcode target
    pub audio_format: String,
    /// Bound on copying one resolved stream to disk
    pub download_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("audio_cache"),
            ttl: Duration::from_secs(6 * 3600),
            cleanup_interval: Duration::from_secs(1800),
            audio_format: "mp3".to_string(),
            download_timeout: Duration::from_secs(120),
        }
    }
}

/// Stream provider endpoints and outbound HTTP settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub piped_instances: Vec<String>,
    pub invidious_instances: Vec<String>,
    /// Bitrate the medium tier aims for, in bits per second
    pub target_bitrate: u64,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub scraper_enabled: bool,
    pub api_key: Option<String>,
    pub api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            piped_instances: parse_instances(DEFAULT_PIPED_INSTANCES),
            invidious_instances: parse_instances(DEFAULT_INVIDIOUS_INSTANCES),
            target_bitrate: 128_000,
            http_timeout: Duration::from_secs(12),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            scraper_enabled: true,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// yt-dlp invocation settings.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub binary: String,
    /// Bound on a full audio extraction
    pub extract_timeout: Duration,
    /// Bound on URL and metadata lookups
    pub tool_timeout: Duration,
    pub cookies_file: Option<PathBuf>,
    /// Passed to `--audio-format` (kbps or yt-dlp's 0-10 scale)
    pub audio_quality: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: tools::YTDLP_BINARY.to_string(),
            extract_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(25),
            cookies_file: None,
            audio_quality: "192".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base for `stream_url`; derived from `Host` when unset
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            public_base_url: None,
        }
    }
}

impl AppConfig {
    /// Configuration from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok());
        if config.extractor.binary == tools::YTDLP_BINARY {
            config.extractor.binary = tools::default_ytdlp();
        }
        config
    }

    /// Configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        let cache = &mut config.cache;
        if let Some(dir) = get("AUDIO_CACHE_DIR") {
            cache.dir = PathBuf::from(dir);
        }
        override_secs(&get, "AUDIO_CACHE_TTL", &mut cache.ttl);
        override_nonzero_secs(&get, "AUDIO_CACHE_CLEANUP_INTERVAL", &mut cache.cleanup_interval);
        override_nonzero_secs(&get, "AUDIO_DOWNLOAD_TIMEOUT", &mut cache.download_timeout);
        if let Some(format) = get("AUDIO_FORMAT") {
            cache.audio_format = format.trim_start_matches('.').to_lowercase();
        }

        let providers = &mut config.providers;
        if let Some(list) = get("PIPED_API_INSTANCES") {
            providers.piped_instances = parse_instances(&list);
        }
        if let Some(list) = get("INVIDIOUS_API_INSTANCES") {
            providers.invidious_instances = parse_instances(&list);
        }
        let mut target_kbps = providers.target_bitrate / 1000;
        override_parsed(&get, "YOUTUBE_TARGET_ABR", &mut target_kbps);
        providers.target_bitrate = target_kbps.saturating_mul(1000);
        override_nonzero_secs(&get, "YOUTUBE_HTTP_TIMEOUT", &mut providers.http_timeout);
        if let Some(ua) = get("YOUTUBE_PROXY_USER_AGENT") {
            providers.user_agent = ua;
        }
        providers.proxy = get("YOUTUBE_PROXY_URL");
        if let Some(flag) = get("YOUTUBE_SCRAPER_ENABLED") {
            match parse_bool(&flag) {
                Some(enabled) => providers.scraper_enabled = enabled,
                None => tracing::warn!(key = "YOUTUBE_SCRAPER_ENABLED", value = %flag, "invalid boolean, using default"),
            }
        }
        providers.api_key = get("YOUTUBE_API_KEY");
        if let Some(base) = get("YOUTUBE_API_BASE") {
            providers.api_base = base.trim_end_matches('/').to_string();
        }

        let extractor = &mut config.extractor;
        if let Some(bin) = get("YT_DLP_BIN") {
            extractor.binary = bin;
        }
        override_nonzero_secs(&get, "YTDLP_TIMEOUT", &mut extractor.extract_timeout);
        override_nonzero_secs(&get, "YT_DLP_TIMEOUT", &mut extractor.tool_timeout);
        extractor.cookies_file = get("YOUTUBE_COOKIES_FILE").map(PathBuf::from);
        if let Some(quality) = get("AUDIO_QUALITY") {
            extractor.audio_quality = quality;
        }

        let server = &mut config.server;
        if let Some(host) = get("STREAM_HOST") {
            server.host = host;
        }
        override_parsed(&get, "STREAM_PORT", &mut server.port);
        server.public_base_url = get("PUBLIC_BASE_URL").map(|u| u.trim_end_matches('/').to_string());

        config
    }
}

/// Split a comma separated instance list, dropping blanks and trailing slashes.
pub fn parse_instances(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn override_parsed<G, T>(get: &G, key: &str, slot: &mut T)
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = get(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!(key, value = %raw, "invalid value, using default"),
        }
    }
}

fn override_secs<G>(get: &G, key: &str, slot: &mut Duration)
where
    G: Fn(&str) -> Option<String>,
{
    let mut secs = slot.as_secs();
    override_parsed(get, key, &mut secs);
    *slot = Duration::from_secs(secs);
}

/// Intervals and timeouts; zero would disable them outright
fn override_nonzero_secs<G>(get: &G, key: &str, slot: &mut Duration)
where
    G: Fn(&str) -> Option<String>,
{
    let default = *slot;
    override_secs(get, key, slot);
    if slot.is_zero() {
        tracing::warn!(key, "zero is not allowed here, using default");
        *slot = default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config_values() {
        let config = config_from(&[]);

        assert_eq!(config.cache.ttl, Duration::from_secs(21_600));
        assert_eq!(config.cache.cleanup_interval, Duration::from_secs(1800));
        assert_eq!(config.cache.audio_format, "mp3");
        assert_eq!(config.extractor.audio_quality, "192");
        assert_eq!(config.extractor.extract_timeout, Duration::from_secs(60));
        assert_eq!(config.extractor.tool_timeout, Duration::from_secs(25));
        assert_eq!(config.providers.target_bitrate, 128_000);
        assert_eq!(config.providers.piped_instances.len(), 3);
        assert_eq!(config.providers.invidious_instances.len(), 5);
        assert!(config.providers.scraper_enabled);
        assert_eq!(config.server.port, 5001);
        assert!(config.cache.dir.ends_with("audio_cache"));
    }

    #[test]
    fn test_env_override() {
        let config = config_from(&[
            ("AUDIO_CACHE_DIR", "/srv/cache"),
            ("AUDIO_CACHE_TTL", "60"),
            ("AUDIO_FORMAT", "M4A"),
            ("YOUTUBE_TARGET_ABR", "96"),
            ("YOUTUBE_SCRAPER_ENABLED", "false"),
            ("YOUTUBE_COOKIES_FILE", "/etc/cookies.txt"),
            ("STREAM_PORT", "8080"),
            ("PUBLIC_BASE_URL", "https://audio.example/"),
        ]);

        assert_eq!(config.cache.dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.audio_format, "m4a");
        assert_eq!(config.providers.target_bitrate, 96_000);
        assert!(!config.providers.scraper_enabled);
        assert_eq!(
            config.extractor.cookies_file,
            Some(PathBuf::from("/etc/cookies.txt"))
        );
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.public_base_url.as_deref(),
            Some("https://audio.example")
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("AUDIO_CACHE_TTL", "six hours"),
            ("STREAM_PORT", "99999"),
            ("YOUTUBE_SCRAPER_ENABLED", "maybe"),
        ]);

        assert_eq!(config.cache.ttl, Duration::from_secs(21_600));
        assert_eq!(config.server.port, 5001);
        assert!(config.providers.scraper_enabled);
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let config = config_from(&[
            ("AUDIO_CACHE_CLEANUP_INTERVAL", "0"),
            ("YOUTUBE_HTTP_TIMEOUT", "0"),
            ("YTDLP_TIMEOUT", "0"),
            ("AUDIO_CACHE_TTL", "0"),
        ]);

        assert_eq!(config.cache.cleanup_interval, Duration::from_secs(1800));
        assert_eq!(config.providers.http_timeout, Duration::from_secs(12));
        assert_eq!(config.extractor.extract_timeout, Duration::from_secs(60));
        // a zero TTL is allowed: every request downloads afresh
        assert_eq!(config.cache.ttl, Duration::ZERO);
    }

    #[test]
    fn test_huge_target_bitrate_saturates() {
        let config = config_from(&[("YOUTUBE_TARGET_ABR", "18446744073709551615")]);
        assert_eq!(config.providers.target_bitrate, u64::MAX);
    }

    #[test]
    fn test_instance_list_parsing() {
        let instances = parse_instances(" https://a.example/ ,,https://b.example//, ");
        assert_eq!(instances, vec!["https://a.example", "https://b.example"]);
        assert!(parse_instances("").is_empty());
    }
}
