//! Content platform resolution and install

use std::path::{Path, PathBuf};
use std::sync::Arc;

use manifest_models::InstallItem;
use platform_models::ModelInfo;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::InstallerError;
use crate::fetch::download::sha256_file;
use crate::fetch::Fetcher;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::platform::select::{resolve_asset, FileKind, ResolvedAsset};

/// Result of installing a content platform item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    /// Downloaded into the destination
    Installed(PathBuf),

    /// The resolved file was already present; nothing was transferred
    AlreadyInstalled(PathBuf),
}

/// Resolves platform model ids into files and installs them
pub struct ContentResolver {
    http: HttpClient,
    fetcher: Arc<dyn Fetcher>,
    staging_dir: PathBuf,
}

impl ContentResolver {
    pub fn new(http: HttpClient, fetcher: Arc<dyn Fetcher>, staging_dir: PathBuf) -> Self {
        Self {
            http,
            fetcher,
            staging_dir,
        }
    }

    /// Provider metadata, both parsed and verbatim
    ///
    /// A request failure, a shape mismatch or an empty version list is `NotFound`.
    pub async fn fetch_metadata(&self, platform_id: u64) -> Result<(ModelInfo, Value), InstallerError> {
        let raw: Value = self
            .http
            .get(&platform_id.to_string())
            .await
            .map_err(|e| InstallerError::NotFound(format!("metadata for model {}: {}", platform_id, e)))?;

        let info: ModelInfo = serde_json::from_value(raw.clone())
            .map_err(|e| InstallerError::NotFound(format!("metadata for model {}: {}", platform_id, e)))?;

        if info.model_versions.is_empty() {
            return Err(InstallerError::NotFound(format!(
                "model {} has no versions",
                platform_id
            )));
        }
        Ok((info, raw))
    }

    /// Resolve a model id (and optional version id) to a concrete file
    pub async fn resolve(
        &self,
        platform_id: u64,
        explicit_version: Option<u64>,
    ) -> Result<(ResolvedAsset, Value), InstallerError> {
        let (info, raw) = self.fetch_metadata(platform_id).await?;
        let asset = resolve_asset(&info, &raw, platform_id, explicit_version).ok_or_else(|| {
            InstallerError::NotFound(match explicit_version {
                Some(v) => format!("model {} has no usable file for version {}", platform_id, v),
                None => format!("model {} has no usable file", platform_id),
            })
        })?;
        Ok((asset, raw))
    }

    /// Resolve and install an item into `dest`
    ///
    /// Every failure is logged with the item's label and reported as `NotFound`.
    pub async fn install(&self, item: &InstallItem, dest: &Path) -> Result<ContentOutcome, InstallerError> {
        let label = item.display_name();
        let platform_id = item.platform_id.ok_or_else(|| {
            InstallerError::NotFound(format!("{} has no platform id", label))
        })?;

        info!("Fetching metadata for {} (model {})", label, platform_id);
        match self.install_resolved(platform_id, item.version_id, dest).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Unable to install {}: {}", label, e);
                Err(match e {
                    InstallerError::NotFound(msg) => InstallerError::NotFound(msg),
                    other => InstallerError::NotFound(other.to_string()),
                })
            }
        }
    }

    async fn install_resolved(
        &self,
        platform_id: u64,
        explicit_version: Option<u64>,
        dest: &Path,
    ) -> Result<ContentOutcome, InstallerError> {
        let (asset, raw) = self.resolve(platform_id, explicit_version).await?;

        let target = dest.join(&asset.file_name);
        if target.exists() {
            info!("{} already exists in {}", asset.file_name, dest.display());
            return Ok(ContentOutcome::AlreadyInstalled(target));
        }

        info!(
            "Downloading {} ({}, {} MB)",
            asset.file_name,
            asset.file_kind,
            (asset.size_kb / 1024.0).floor()
        );

        if asset.file_kind == FileKind::Archive {
            let archive = self
                .fetcher
                .fetch_archive(&asset.download_url, &self.staging_dir)
                .await?;
            self.fetcher.extract(&archive, dest).await?;
            return Ok(ContentOutcome::Installed(dest.to_path_buf()));
        }

        tokio::fs::create_dir_all(dest).await?;

        let mut sidecars = Vec::new();
        if let (Some(url), Some(name)) = (&asset.preview_image_url, asset.preview_file_name()) {
            sidecars.push(self.fetcher.download_file(url, dest, Some(&name)).await?);
        }
        if let Some(record) = &asset.metadata_record {
            let path = dest.join(asset.metadata_file_name());
            File::new(path.clone()).write_json(record).await?;
            sidecars.push(path);
        }
        let info_path = dest.join(asset.raw_response_file_name());
        File::new(info_path.clone()).write_json(&raw).await?;
        sidecars.push(info_path);

        let path = self
            .fetcher
            .download_file(&asset.download_url, dest, Some(&asset.file_name))
            .await?;
        if let Err(e) = verify_digest(&path, asset.sha256.as_deref()).await {
            remove_files(&sidecars).await;
            return Err(e);
        }

        Ok(ContentOutcome::Installed(path))
    }
}

/// Best-effort removal of files describing an asset that was rejected
async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Unable to remove {}: {}", path.display(), e);
        }
    }
}

/// Compare a downloaded file against its published SHA256; a mismatch removes the file
async fn verify_digest(path: &Path, expected: Option<&str>) -> Result<(), InstallerError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = sha256_file(path).await?;
    if !actual.eq_ignore_ascii_case(expected) {
        let _ = tokio::fs::remove_file(path).await;
        return Err(InstallerError::FetchFailure(format!(
            "{}: checksum mismatch (expected {}, got {})",
            path.display(),
            expected,
            actual
        )));
    }
    Ok(())
}
