// Downloader module - stream resolution cascade and local audio cache

pub mod backends;
pub mod cache;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod identifier;
pub mod janitor;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use cache::{CacheManager, CacheSettings, ExtractAudio, LockRegistry, ResolveAndCopy};
pub use errors::DownloadError;
pub use extractors::YtDlpCli;
pub use format_selector::{FormatSelector, RawBitrate, Rendition};
pub use identifier::normalize_video_id;
pub use janitor::CacheJanitor;
pub use metadata::MetadataService;
pub use models::{CacheEntry, CacheStats, QualityTier, ResolvedStream, StreamCandidate, VideoInfo};
pub use orchestrator::ResolverCascade;
pub use traits::{AcquisitionStrategy, AudioExtractor, MetadataLookup, StreamProvider};
