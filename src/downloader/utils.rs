// Helper functions shared by providers, extractors and the cache

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::DownloadError;

/// Build the shared outbound HTTP client
pub fn build_http_client(
    user_agent: &str,
    proxy: Option<&str>,
) -> Result<reqwest::Client, DownloadError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| DownloadError::ParseError(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(DownloadError::from_http)
}

/// GET a JSON document with a per-call bound
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    timeout_after: Duration,
) -> Result<T, DownloadError> {
    let response = client
        .get(url)
        .timeout(timeout_after)
        .send()
        .await
        .map_err(DownloadError::from_http)?
        .error_for_status()
        .map_err(DownloadError::from_http)?;

    let body = response.bytes().await.map_err(DownloadError::from_http)?;
    serde_json::from_slice(&body).map_err(|e| DownloadError::ParseError(format!("Invalid JSON from {}: {}", url, e)))
}

/// Stream `url` into `destination`, returning the number of bytes written
///
/// The whole transfer, not just the connect, is bounded by `timeout_after`.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    timeout_after: Duration,
) -> Result<u64, DownloadError> {
    let response = client
        .get(url)
        .timeout(timeout_after)
        .send()
        .await
        .map_err(DownloadError::from_http)?
        .error_for_status()
        .map_err(DownloadError::from_http)?;

    let write_err = |source: std::io::Error| DownloadError::DownloadWriteFailure {
        path: destination.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::create(destination).await.map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DownloadError::from_http)?;
        writer.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    writer.flush().await.map_err(write_err)?;

    if written == 0 {
        return Err(DownloadError::ParseError(format!("Empty body from {}", url)));
    }
    Ok(written)
}

/// Run command with timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_after: Duration,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DownloadError::ToolNotFound(program.to_string())
            } else {
                DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e))
            }
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(timeout_after, child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| DownloadError::ExecutionError(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = join_pipe(stdout_task).await?;
            let stderr = join_pipe(stderr_task).await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            tracing::warn!(program, timeout_secs = timeout_after.as_secs(), "subprocess timed out");
            Err(DownloadError::NetworkTimeout)
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("pipe reader failed: {}", e)))?
        .map_err(|e| DownloadError::ExecutionError(format!("Failed to read pipe: {}", e)))
}
