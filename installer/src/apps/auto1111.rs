//! Secondary application (Automatic1111) lifecycle

use std::fmt::Write as _;
use std::sync::Arc;

use manifest_models::Catalog;
use tracing::{error, info};

use crate::app::options::InstallConfig;
use crate::apps::{catalog_url, clear, fetch_unpacked, move_tree, AppOutcome};
use crate::dispatch::{ItemReport, ItemStatus};
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::exists;
use crate::filesys::file::File;
use crate::utils::name_from_url;

/// Model directory flags and their folders under the data root
pub const MODEL_DIR_FLAGS: [(&str, &str); 13] = [
    ("--ckpt-dir", "models/checkpoints"),
    ("--codeformer-models-path", "models/codeformer"),
    ("--controlnet-dir", "models/controlnet"),
    ("--embeddings-dir", "models/embeddings"),
    ("--esrgan-models-path", "models/esrgan"),
    ("--gfpgan-models-path", "models/gfpgan"),
    ("--hypernetwork-dir", "models/hypernetworks"),
    ("--ldsr-models-path", "models/ldsr"),
    ("--lora-dir", "models/loras"),
    ("--realesrgan-models-path", "models/realesrgan"),
    ("--swinir-models-path", "models/swinir"),
    ("--textual-inversion-templates-dir", "models/embeddings"),
    ("--vae-dir", "models/vae"),
];

/// `webui-user.bat` pointing every model folder at the shared data tree
///
/// Paths are written with forward slashes.
pub fn webui_user_script(config: &InstallConfig) -> String {
    let data = config.data_root.display().to_string().replace('\\', "/");
    let mut script = String::from("title Auto1111\nset PYTHON=\nset GIT=\nset VENV_DIR=\n");
    let _ = write!(
        script,
        "set COMMANDLINE_ARGS= --xformers --update-all-extensions --port {}",
        config.secondary_port
    );
    for (flag, folder) in MODEL_DIR_FLAGS {
        let _ = write!(script, " ^\n{} \"{}/{}\"", flag, data, folder);
    }
    script.push_str("\n\ngit pull\ncall webui.bat\n");
    script
}

/// Automatic1111 install and its extensions
pub struct SecondaryApp {
    config: Arc<InstallConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl SecondaryApp {
    pub fn new(config: Arc<InstallConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    pub async fn is_installed(&self) -> bool {
        exists::path_exists(&self.config.secondary_root()).await
    }

    pub async fn install(&self, catalog: &Catalog, reinstall: bool) -> Result<AppOutcome, InstallerError> {
        let root = self.config.secondary_root();
        if self.is_installed().await {
            if !reinstall {
                info!("Auto1111 already installed at {}", root.display());
                return Ok(AppOutcome::AlreadyInstalled);
            }
            clear(&root).await?;
        }

        let url = catalog_url(&catalog.auto_installer_url, "autoInstallerUrl")?;
        let work = fetch_unpacked(self.fetcher.as_ref(), url, &self.config.staging_dir, "auto1111").await?;
        move_tree(work.path(), &root).await?;

        let webui = root.join("webui");
        let extensions = webui.join("extensions");
        let mut reports = Vec::with_capacity(catalog.extensions.len());
        for repo in &catalog.extensions {
            let status = match self.fetcher.clone_repo(repo, &extensions).await {
                Ok(_) => ItemStatus::Installed,
                Err(e) => {
                    error!("Failed to install extension {}: {}", repo, e);
                    ItemStatus::Failed(e.to_string())
                }
            };
            reports.push(ItemReport {
                label: name_from_url(repo),
                status,
            });
        }

        File::new(webui.join("webui-user.bat"))
            .write_string(&webui_user_script(&self.config))
            .await?;

        info!("Install complete: Automatic 1111");
        Ok(AppOutcome::Installed(reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_script_uses_forward_slashes() {
        let config = InstallConfig {
            data_root: PathBuf::from("D:\\genai_data"),
            secondary_port: 7860,
            ..Default::default()
        };
        let script = webui_user_script(&config);

        assert!(!script.contains('\\'));
        assert!(script.contains("--xformers --update-all-extensions --port 7860 ^\n"));
        assert!(script.contains("--ckpt-dir \"D:/genai_data/models/checkpoints\" ^\n"));
        assert!(script.contains("--vae-dir \"D:/genai_data/models/vae\"\n\ngit pull\ncall webui.bat"));
        assert_eq!(script.matches(" ^\n").count(), MODEL_DIR_FLAGS.len());
    }
}
