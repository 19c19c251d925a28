//! SeargeSDXL: archive with an interactive installer script

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use manifest_models::InstallItem;
use tokio::fs;
use tracing::{debug, info};

use crate::app::options::InstallConfig;
use crate::dispatch::registry::CustomInstaller;
use crate::dispatch::scripted::{run_scripted, PromptScript};
use crate::errors::InstallerError;
use crate::filesys::dir::Dir;
use crate::filesys::exists;

/// Prefix shared by the installer script and its companion files
const INSTALLER_PREFIX: &str = "SeargeSDXL-Installer.";

#[cfg(windows)]
const INSTALLER_SCRIPT: &str = "SeargeSDXL-Installer.bat";

#[cfg(not(windows))]
const INSTALLER_SCRIPT: &str = "SeargeSDXL-Installer.sh";

/// Answers for the installer's menus
pub fn prompt_script() -> PromptScript {
    PromptScript::new()
        .always("then press enter", "")
        .always("continue . . .", "")
        .sequence("(default = [r]", ["r", "0", "1", "4", "5", "6", "d"])
}

/// Remove the installer files left in `dir`, returning how many were removed
pub async fn remove_installer_files(dir: &Path) -> Result<usize, InstallerError> {
    let mut removed = 0;
    for file in Dir::new(dir).list_files().await? {
        let is_installer = file
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with(INSTALLER_PREFIX));
        if is_installer {
            debug!("Removing {}", file.display());
            fs::remove_file(&file).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub struct SeargeInstaller {
    config: Arc<InstallConfig>,
}

impl SeargeInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CustomInstaller for SeargeInstaller {
    fn key(&self) -> &str {
        "seargeInstaller"
    }

    async fn check(&self, _item: &InstallItem) -> Result<(), InstallerError> {
        super::require_worker(&self.config).await
    }

    async fn is_installed(&self, _item: &InstallItem) -> bool {
        let nodes = self.config.data_layout().custom_nodes_dir();
        exists::path_exists(&nodes.path().join("SeargeSDXL")).await
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        let script = fetched.join(INSTALLER_SCRIPT);
        if !exists::path_exists(&script).await {
            return Err(InstallerError::ProcessError(format!(
                "{} not found after extraction",
                script.display()
            )));
        }

        #[cfg(windows)]
        let (program, args) = (Path::new("cmd"), ["/C", INSTALLER_SCRIPT]);

        #[cfg(not(windows))]
        let (program, args) = (Path::new("sh"), [INSTALLER_SCRIPT]);

        run_scripted(program, &args, fetched, prompt_script()).await?;

        let removed = remove_installer_files(fetched).await?;
        info!("SeargeSDXL installed, removed {} installer files", removed);
        Ok(())
    }
}
