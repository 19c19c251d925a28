//! Worker application (ComfyUI portable) lifecycle

use std::path::Path;
use std::sync::Arc;

use manifest_models::{Catalog, ItemKind, Manifest, Phase};
use tracing::{info, warn};

use crate::app::options::InstallConfig;
use crate::apps::{catalog_url, clear, fetch_unpacked, move_tree, AppOutcome};
use crate::dispatch::{Dispatcher, PhaseResult};
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::exists;
use crate::filesys::file::File;
use crate::utils::name_from_url;

/// Launcher scripts shipped with the portable build
pub const LAUNCHERS: [&str; 2] = ["run_cpu.bat", "run_nvidia_gpu.bat"];

/// First line of a launcher this tool has already patched
pub const MODIFIED_MARKER: &str = "@REM GenAI Modified\n";

/// Folder the portable archive unpacks to
const PORTABLE_DIR: &str = "ComfyUI_windows_portable";

const LAUNCH_FLAG: &str = "standalone-build";

/// Manifest fragment selecting the manager extension
const MANAGER_REPO: &str = "ComfyUI-Manager.git";

/// Patched launcher contents, or `None` when already patched
pub fn patch_launcher(contents: &str, data_root: &Path, port: u16) -> Option<String> {
    if contents.contains(MODIFIED_MARKER) {
        return None;
    }
    let flags = format!(
        "{} --disable-auto-launch --listen --output-directory \"{}\\output\" --port {}",
        LAUNCH_FLAG,
        data_root.display(),
        port
    );
    Some(format!(
        "{}{}",
        MODIFIED_MARKER,
        contents.replacen(LAUNCH_FLAG, &flags, 1)
    ))
}

/// ComfyUI portable install, links and extension phases
pub struct WorkerApp {
    config: Arc<InstallConfig>,
    fetcher: Arc<dyn Fetcher>,
    dispatcher: Arc<Dispatcher>,
}

impl WorkerApp {
    pub fn new(config: Arc<InstallConfig>, fetcher: Arc<dyn Fetcher>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            fetcher,
            dispatcher,
        }
    }

    pub async fn is_installed(&self) -> bool {
        exists::path_exists(&self.config.worker_root()).await
    }

    /// Every custom-phase repository in `manifest` is present
    pub async fn nodes_installed(&self, manifest: &Manifest) -> bool {
        for item in manifest.for_phase(Phase::Custom) {
            let (ItemKind::Repository, Some(url)) = (item.kind, &item.source_url) else {
                continue;
            };
            let target = self.config.destination(item).join(name_from_url(url));
            if !exists::path_exists(&target).await {
                return false;
            }
        }
        true
    }

    /// Point the application's `custom_nodes` and `models` at the shared data tree
    pub async fn make_symlinks(&self) -> Result<(), InstallerError> {
        let app = self.config.worker_root().join("ComfyUI");
        let layout = self.config.data_layout();
        for (shared, link) in [
            (layout.custom_nodes_dir(), app.join("custom_nodes")),
            (layout.models_dir(), app.join("models")),
        ] {
            info!("Linking {} -> {}", link.display(), shared.path().display());
            shared.create().await?;
            shared.link_from(&link).await?;
        }
        Ok(())
    }

    /// Patch one launcher; returns whether the file changed
    pub async fn update_launcher(&self, path: &Path) -> Result<bool, InstallerError> {
        let file = File::new(path);
        if !file.exists().await {
            warn!("Launcher {} not found", path.display());
            return Ok(false);
        }
        let contents = file.read_string().await?;
        match patch_launcher(&contents, &self.config.data_root, self.config.worker_port) {
            Some(patched) => {
                file.write_string(&patched).await?;
                Ok(true)
            }
            None => {
                info!("Launcher already modified: {}", path.display());
                Ok(false)
            }
        }
    }

    /// Install the portable build and the manager extension, then cycle it once
    pub async fn install(&self, catalog: &Catalog, reinstall: bool) -> Result<AppOutcome, InstallerError> {
        let root = self.config.worker_root();
        if self.is_installed().await {
            if !reinstall {
                info!("ComfyUI already installed at {}", root.display());
                return Ok(AppOutcome::AlreadyInstalled);
            }
            self.uninstall().await?;
        }

        let url = catalog_url(&catalog.comfy_installer_url, "comfyInstallerUrl")?;
        let work = fetch_unpacked(self.fetcher.as_ref(), url, &self.config.staging_dir, "comfyui").await?;
        let portable = work.path().join(PORTABLE_DIR);
        if !exists::path_exists(&portable).await {
            work.delete().await?;
            return Err(InstallerError::FetchFailure(format!(
                "{} did not contain {}",
                url, PORTABLE_DIR
            )));
        }
        move_tree(&portable, &root).await?;
        work.delete().await?;

        for launcher in LAUNCHERS {
            self.update_launcher(&root.join(launcher)).await?;
        }
        self.make_symlinks().await?;

        let manager = catalog.custom_nodes.with_source_containing(MANAGER_REPO);
        let reports = self.dispatcher.process_items(manager.items(), false).await;
        self.dispatcher
            .boot(self.config.boot.post_install_timeout)
            .await;

        info!("Install complete: ComfyUI & Manager");
        Ok(AppOutcome::Installed(reports))
    }

    /// Empty the application root and the shared extension folder
    pub async fn uninstall(&self) -> Result<(), InstallerError> {
        clear(&self.config.worker_root()).await?;
        clear(self.config.data_layout().custom_nodes_dir().path()).await
    }

    /// Run the three extension phases in order, each followed by its boot
    ///
    /// Returns `None` when the extensions are already present and no reinstall was requested.
    pub async fn install_nodes(
        &self,
        manifest: &Manifest,
        reinstall: bool,
    ) -> Result<Option<Vec<PhaseResult>>, InstallerError> {
        if self.nodes_installed(manifest).await {
            if !reinstall {
                info!("Custom nodes already installed");
                return Ok(None);
            }
            clear(self.config.data_layout().custom_nodes_dir().path()).await?;
        }

        let mut results = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            results.push(self.dispatcher.run_phase(manifest, phase).await);
        }
        info!("Install complete: Custom Nodes");
        Ok(Some(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAUNCHER: &str = ".\\python_embeded\\python.exe -s ComfyUI\\main.py --windows-standalone-build\r\npause\r\n";

    #[test]
    fn test_patch_launcher_once() {
        let patched = patch_launcher(LAUNCHER, Path::new("D:\\genai_data"), 8188).unwrap();
        assert!(patched.starts_with(MODIFIED_MARKER));
        assert!(patched.contains(
            "--windows-standalone-build --disable-auto-launch --listen --output-directory \"D:\\genai_data\\output\" --port 8188"
        ));
        assert_eq!(patched.matches(LAUNCH_FLAG).count(), 1);

        assert!(patch_launcher(&patched, Path::new("D:\\genai_data"), 8188).is_none());
    }

    #[test]
    fn test_patch_replaces_first_occurrence_only() {
        let twice = format!("{}{}", LAUNCHER, LAUNCHER);
        let patched = patch_launcher(&twice, Path::new("/data"), 7861).unwrap();
        assert_eq!(patched.matches("--disable-auto-launch").count(), 1);
    }
}
