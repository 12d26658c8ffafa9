// Locating and probing the extraction tool binary

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::utils::run_output_with_timeout;

pub const YTDLP_BINARY: &str = "yt-dlp";

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub is_available: bool,
}

impl ToolInfo {
    /// Resolve `program` (bare name or path) and ask it for `--version`
    pub async fn probe(program: &str) -> Self {
        let path = resolve_binary(program);
        let version = match &path {
            Some(p) => get_version(p).await,
            None => None,
        };

        Self {
            name: program.to_string(),
            is_available: path.is_some(),
            path,
            version,
        }
    }
}

/// Find an executable: explicit paths are checked as-is, bare names are
/// searched in common install locations and then `PATH`.
pub fn resolve_binary(program: &str) -> Option<String> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program)
            .is_file()
            .then(|| program.to_string());
    }

    let common_dirs = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];
    let path_dirs = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect::<Vec<PathBuf>>())
        .unwrap_or_default();

    common_dirs
        .iter()
        .map(PathBuf::from)
        .chain(path_dirs)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .map(|p| p.to_string_lossy().to_string())
}

/// Default binary: a located `yt-dlp`, or the bare name for `PATH` lookup at spawn time
pub fn default_ytdlp() -> String {
    resolve_binary(YTDLP_BINARY).unwrap_or_else(|| YTDLP_BINARY.to_string())
}

async fn get_version(path: &str) -> Option<String> {
    match run_output_with_timeout(path, vec!["--version".to_string()], Duration::from_secs(10)).await {
        Ok(output) if output.status.success() => {
            let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!out.is_empty()).then_some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_resolved() {
        assert!(resolve_binary("definitely-not-a-real-binary-7c1f").is_none());
        assert!(resolve_binary("/nonexistent/dir/yt-dlp").is_none());
    }

    #[tokio::test]
    async fn test_probe_missing_tool() {
        let info = ToolInfo::probe("definitely-not-a-real-binary-7c1f").await;
        assert!(!info.is_available);
        assert!(info.version.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolves_from_path() {
        assert!(resolve_binary("sh").is_some());
    }
}
