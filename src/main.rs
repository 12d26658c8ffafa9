use clap::Parser;

use youtube_audio_proxy::logging::{init_tracing, LogLevel};
use youtube_audio_proxy::AppConfig;

/// Resolve YouTube audio and serve it from a local cache
#[derive(Debug, Parser)]
#[command(name = "youtube-audio-proxy", version)]
struct Cli {
    /// Bind address (overrides STREAM_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides STREAM_PORT)
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level)?;

    let mut config = AppConfig::from_env();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    youtube_audio_proxy::run(config).await
}
