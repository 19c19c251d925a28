//! Large model bundles cloned from model hubs
//!
//! Each bundle is cloned by the dispatcher, then sorted into the shared model
//! and workflow folders. Staging clones are removed afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use manifest_models::InstallItem;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::app::options::InstallConfig;
use crate::dispatch::registry::CustomInstaller;
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::dir::Dir;
use crate::filesys::exists;
use crate::utils::name_from_url;

const WEIGHTS_EXT: &str = "safetensors";

/// Copy the first `.safetensors` file in `src` to `dest`, if there is one
async fn copy_first_weights(src: &Path, dest: &Path) -> Result<Option<PathBuf>, InstallerError> {
    let dir = Dir::new(src);
    if !dir.exists().await {
        return Ok(None);
    }
    let first = dir.list_files().await?.into_iter().find(|f| {
        f.extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(WEIGHTS_EXT))
    });
    let Some(file) = first else {
        return Ok(None);
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    debug!("Copying {} to {}", file.display(), dest.display());
    fs::copy(&file, dest).await?;
    Ok(Some(dest.to_path_buf()))
}

/// Copy matching files only when `src` exists
async fn copy_if_present(src: &Path, dest: &Path, ext: &str) -> Result<usize, InstallerError> {
    let dir = Dir::new(src);
    if !dir.exists().await {
        return Ok(0);
    }
    dir.copy_matching(dest, ext).await
}

/// Control-LoRA weights, revision encoders and example workflows
pub struct ControlLoraInstaller {
    config: Arc<InstallConfig>,
}

impl ControlLoraInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }

    /// Sort a fetched Control-LoRA clone into the data tree
    pub async fn distribute(&self, clone: &Path) -> Result<(), InstallerError> {
        let layout = self.config.data_layout();
        let controlnet = layout.model_dir("controlnet");
        let workflows = layout.workflows_dir();

        for rank in ["control-LoRAs-rank128", "control-LoRAs-rank256"] {
            let src = Dir::new(clone.join(rank));
            if src.exists().await {
                src.move_to(&controlnet.path().join(rank)).await?;
            }
        }

        let revision = clone.join("revision");
        let encoders = copy_if_present(&revision, layout.model_dir("clip_vision").path(), WEIGHTS_EXT).await?;
        let examples = copy_if_present(&revision, workflows.path(), "json").await?;
        debug!("Copied {} revision encoders and {} revision workflows", encoders, examples);

        let bundled = Dir::new(clone.join("comfy-control-LoRA-workflows"));
        if bundled.exists().await {
            bundled
                .copy_to(&workflows.path().join("comfy-control-LoRA-workflows"))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CustomInstaller for ControlLoraInstaller {
    fn key(&self) -> &str {
        "controlLoraInstaller"
    }

    async fn check(&self, _item: &InstallItem) -> Result<(), InstallerError> {
        super::require_worker(&self.config).await
    }

    async fn is_installed(&self, _item: &InstallItem) -> bool {
        let controlnet = self.config.data_layout().model_dir("controlnet");
        exists::contains_match(controlnet.path(), "rank128").await
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        self.distribute(fetched).await?;
        Dir::new(fetched).delete().await?;
        info!("Control-LoRA models installed");
        Ok(())
    }
}

/// IP-Adapter node pack plus its adapter and image encoder weights
pub struct IpAdapterInstaller {
    config: Arc<InstallConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl IpAdapterInstaller {
    pub fn new(config: Arc<InstallConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Sort a fetched IP-Adapter clone into the data tree
    pub async fn distribute(&self, clone: &Path) -> Result<(), InstallerError> {
        let layout = self.config.data_layout();
        let clip_vision = layout.model_dir("clip_vision");
        let ipadapter = layout.model_dir("ipadapter");

        let encoders = [
            ("models/image_encoder", "sd/sdImageDetector.safetensors"),
            ("sdxl_models/image_encoder", "sdxl/sdxlImageDetector.safetensors"),
        ];
        for (src, dest) in encoders {
            if copy_first_weights(&clone.join(src), &clip_vision.path().join(dest))
                .await?
                .is_none()
            {
                warn!("No image encoder found in {}", src);
            }
        }

        copy_if_present(&clone.join("models"), &ipadapter.path().join("sd"), WEIGHTS_EXT).await?;
        copy_if_present(&clone.join("sdxl_models"), &ipadapter.path().join("sdxl"), WEIGHTS_EXT).await?;
        Ok(())
    }
}

#[async_trait]
impl CustomInstaller for IpAdapterInstaller {
    fn key(&self) -> &str {
        "ipadapterInstaller"
    }

    async fn check(&self, _item: &InstallItem) -> Result<(), InstallerError> {
        super::require_worker(&self.config).await
    }

    async fn is_installed(&self, _item: &InstallItem) -> bool {
        let ipadapter = self.config.data_layout().model_dir("ipadapter");
        exists::contains_match(ipadapter.path(), "sdxl").await
    }

    async fn run(&self, item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        if let Some(node_url) = &item.companion_url {
            let nodes = self.config.data_layout().custom_nodes_dir();
            if exists::path_exists(&nodes.path().join(name_from_url(node_url))).await {
                debug!("IP-Adapter nodes already present");
            } else {
                self.fetcher.clone_repo(node_url, nodes.path()).await?;
            }
        }

        self.distribute(fetched).await?;
        Dir::new(fetched).delete().await?;
        info!("IP-Adapter models installed");
        Ok(())
    }
}

/// unCLIP checkpoints; the clone itself is the install
pub struct UnclipInstaller {
    config: Arc<InstallConfig>,
}

impl UnclipInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CustomInstaller for UnclipInstaller {
    fn key(&self) -> &str {
        "unclipInstaller"
    }

    async fn check(&self, _item: &InstallItem) -> Result<(), InstallerError> {
        super::require_worker(&self.config).await
    }

    async fn is_installed(&self, item: &InstallItem) -> bool {
        exists::contains_match(&self.config.destination(item), "unclip").await
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        info!("unCLIP models installed in {}", fetched.display());
        Ok(())
    }
}
