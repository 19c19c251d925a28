//! Installation configuration

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use manifest_models::{InstallItem, ItemRoot};

use crate::storage::layout::DataLayout;
use crate::storage::settings::Preferences;
use crate::utils::unquote;

/// Default content platform endpoint
pub const DEFAULT_PLATFORM_URL: &str = "https://civitai.com/api/v1/models/";

/// Embedded interpreter, relative to the worker application root
#[cfg(windows)]
pub const DEFAULT_INTERPRETER: &str = "python_embeded/python.exe";

#[cfg(not(windows))]
pub const DEFAULT_INTERPRETER: &str = "python_embeded/bin/python";

/// Resolved configuration for one run
///
/// Built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Where the applications are installed
    pub install_root: PathBuf,

    /// Shared data tree
    pub data_root: PathBuf,

    /// Scratch directory for downloads
    pub staging_dir: PathBuf,

    /// Worker application port
    pub worker_port: u16,

    /// Secondary application port
    pub secondary_port: u16,

    /// Run the worker application on the GPU
    pub use_gpu: bool,

    /// Embedded interpreter, relative to the worker application root
    pub interpreter: PathBuf,

    /// 7-Zip executable used for `.zip` and `.7z` archives
    pub seven_zip: String,

    /// Content platform endpoint
    pub platform_url: String,

    /// Supervised boot budgets
    pub boot: BootOptions,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default(), PathBuf::from("."))
    }
}

impl InstallConfig {
    /// Build from preferences; command-line overrides are applied by the caller
    pub fn from_preferences(prefs: &Preferences, staging_dir: PathBuf) -> Self {
        Self {
            install_root: PathBuf::from(unquote(&prefs.root_path)),
            data_root: PathBuf::from(unquote(&prefs.data_path)),
            staging_dir,
            worker_port: prefs.comfy_port,
            secondary_port: prefs.auto_port,
            use_gpu: prefs.use_nvidia,
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            seven_zip: "7z".to_string(),
            platform_url: DEFAULT_PLATFORM_URL.to_string(),
            boot: BootOptions::default(),
        }
    }

    /// Write the effective values back into preferences
    pub fn to_preferences(&self) -> Preferences {
        Preferences {
            root_path: self.install_root.display().to_string(),
            data_path: self.data_root.display().to_string(),
            auto_port: self.secondary_port,
            comfy_port: self.worker_port,
            use_nvidia: self.use_gpu,
        }
    }

    /// Worker application root
    pub fn worker_root(&self) -> PathBuf {
        self.install_root.join("comfyui")
    }

    /// Secondary application root
    pub fn secondary_root(&self) -> PathBuf {
        self.install_root.join("auto1111")
    }

    /// Absolute path of the embedded interpreter
    pub fn interpreter_path(&self) -> PathBuf {
        self.worker_root().join(&self.interpreter)
    }

    /// Where the ffmpeg binaries are placed
    pub fn ffmpeg_dir(&self) -> PathBuf {
        self.install_root.join("ffmpeg")
    }

    pub fn data_layout(&self) -> DataLayout {
        DataLayout::new(&self.data_root)
    }

    /// Root a manifest subpath is relative to
    pub fn root_for(&self, root: ItemRoot) -> PathBuf {
        match root {
            ItemRoot::Data => self.data_root.clone(),
            ItemRoot::App => self.worker_root(),
            ItemRoot::Staging => self.staging_dir.clone(),
        }
    }

    /// Destination directory of an item
    pub fn destination(&self, item: &InstallItem) -> PathBuf {
        self.root_for(item.root).join(subpath(&item.destination_subpath))
    }

    /// Directory an item's search term is matched in
    pub fn search_dir(&self, item: &InstallItem) -> PathBuf {
        self.root_for(item.root).join(subpath(item.search_subpath()))
    }
}

/// Manifest subpath as a relative path; either separator is accepted
///
/// Parent and root components are dropped so items stay inside their root.
pub fn subpath(raw: &str) -> PathBuf {
    raw.split(['/', '\\'])
        .map(Path::new)
        .flat_map(|p| p.components())
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Supervised boot budgets
#[derive(Debug, Clone)]
pub struct BootOptions {
    /// Budget of a regular cycle
    pub timeout: Duration,

    /// Budget of the first cycle after installing the application
    pub post_install_timeout: Duration,

    /// Liveness polling interval
    pub tick: Duration,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            post_install_timeout: Duration::from_secs(60),
            tick: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subpath_accepts_both_separators() {
        assert_eq!(subpath("models\\checkpoints/sd"), PathBuf::from("models/checkpoints/sd"));
        assert_eq!(subpath("../escape/./x"), PathBuf::from("escape/x"));
        assert_eq!(subpath(""), PathBuf::new());
    }

    #[test]
    fn test_destination_uses_item_root() {
        let config = InstallConfig {
            install_root: PathBuf::from("/opt/genai"),
            data_root: PathBuf::from("/srv/data"),
            staging_dir: PathBuf::from("/tmp/stage"),
            ..Default::default()
        };
        let mut item: InstallItem = serde_json::from_value(serde_json::json!({
            "type": "git", "path": "models\\controlnet", "url": "https://x/y.git"
        }))
        .unwrap();

        assert_eq!(config.destination(&item), PathBuf::from("/srv/data/models/controlnet"));
        item.root = ItemRoot::Staging;
        assert_eq!(config.destination(&item), PathBuf::from("/tmp/stage/models/controlnet"));
        item.root = ItemRoot::App;
        assert_eq!(config.destination(&item), PathBuf::from("/opt/genai/comfyui/models/controlnet"));
    }
}
