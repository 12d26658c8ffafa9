// Direct-extraction tool: the `yt-dlp` CLI behind `AudioExtractor`
//
// The rest of the crate only depends on the trait, so a different extractor
// (or a stub in tests) can be swapped in without touching the cache manager.

mod cli;
mod diagnostics;

pub use cli::{watch_url, YtDlpCli};
pub use diagnostics::{diagnose_stderr, summarize_stderr, BlockingReason};
