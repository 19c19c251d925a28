//! Streaming HTTP downloads

use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::errors::InstallerError;
use crate::utils::{hex, last_segment};

const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Build the progress bar for a transfer of `total` bytes
pub fn transfer_bar(total: Option<u64>, message: String, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    pb.set_message(message);
    pb
}

/// File name from a `Content-Disposition` header value
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // RFC 5987: charset'lang'value
            let name = encoded.rsplit('\'').next().unwrap_or(encoded);
            let decoded = url::form_urlencoded::parse(format!("n={}", name).as_bytes())
                .next()
                .map(|(_, v)| v.into_owned())
                .unwrap_or_else(|| name.to_string());
            return sanitize(&decoded);
        }
        if let Some(name) = part.strip_prefix("filename=") {
            plain = sanitize(name.trim_matches('"'));
        }
    }
    plain
}

fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}

/// Download `url` into `dir`
///
/// The file is named `name` when given, else from the response's
/// `Content-Disposition`, else from the URL's last path segment. The body is
/// streamed into a `.part` file that is renamed once complete.
pub async fn download(
    client: &Client,
    url: &str,
    dir: &Path,
    name: Option<&str>,
    show_progress: bool,
) -> Result<PathBuf, InstallerError> {
    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| InstallerError::FetchFailure(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        error!("Download failed: {} - {}", status, url);
        return Err(InstallerError::FetchFailure(format!("{}: {}", status, url)));
    }

    let file_name = name
        .map(str::to_string)
        .or_else(|| {
            response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename_from_disposition)
        })
        .or_else(|| sanitize(&last_segment(url)))
        .ok_or_else(|| InstallerError::FetchFailure(format!("No file name for {}", url)))?;

    let total = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    fs::create_dir_all(dir).await?;
    let target = dir.join(&file_name);
    let partial = dir.join(format!("{}.part", file_name));

    let pb = transfer_bar(total, format!("Downloading {}", file_name), show_progress);
    let mut file = fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                pb.abandon();
                drop(file);
                let _ = fs::remove_file(&partial).await;
                return Err(InstallerError::FetchFailure(format!("{}: {}", url, e)));
            }
        };
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.sync_all().await?;
    drop(file);

    fs::rename(&partial, &target).await?;
    pb.finish_and_clear();
    info!("Downloaded {}", target.display());
    Ok(target)
}

/// SHA256 of a file, lowercase hex
pub async fn sha256_file(path: &Path) -> Result<String, InstallerError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"analogMadness_v70.safetensors\"").as_deref(),
            Some("analogMadness_v70.safetensors")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"x.bin\"; filename*=UTF-8''my%20model.bin").as_deref(),
            Some("my model.bin")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[tokio::test]
    async fn test_sha256_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
