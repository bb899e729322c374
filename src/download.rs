//! Streamed download of the job's presigned URL into a temporary file.
//!
//! The returned `NamedTempFile` owns the file: dropping it on any exit
//! path removes the file from disk.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tempfile::NamedTempFile;

pub async fn download_to_temp(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
    timeout: Duration,
) -> Result<NamedTempFile> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .context("download request failed")?
        .error_for_status()
        .context("download returned an error status")?;

    if let Some(length) = response.content_length()
        && length > max_bytes
    {
        anyhow::bail!("file of {length} bytes exceeds the {max_bytes} byte limit");
    }

    let mut file = NamedTempFile::new().context("failed to create temporary file")?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.context("download stream interrupted")?;
        written += bytes.len() as u64;
        if written > max_bytes {
            anyhow::bail!("download exceeds the {max_bytes} byte limit");
        }
        file.write_all(&bytes)
            .context("failed writing downloaded bytes")?;
    }
    file.flush().context("failed flushing temporary file")?;

    Ok(file)
}
