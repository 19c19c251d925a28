//! Storage layout configuration

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::InstallerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Directories created under the data root by `prepare`
pub const DATA_DIRS: &[&str] = &[
    "custom_nodes",
    "output",
    "workflows",
    "models/checkpoints",
    "models/checkpoints/sd",
    "models/checkpoints/sdxl",
    "models/classifiers",
    "models/clip",
    "models/clip_vision",
    "models/codeformer",
    "models/configs",
    "models/controlnet",
    "models/diffusers",
    "models/embeddings",
    "models/esrgan",
    "models/gfpgan",
    "models/hypernetworks",
    "models/ipadapter",
    "models/ldsr",
    "models/loras",
    "models/loras/sd",
    "models/loras/sdxl",
    "models/lycoris",
    "models/style_models",
    "models/swinir",
    "models/realesrgan",
    "models/upscale_models",
    "models/unet",
    "models/vae",
    "models/vae_approx",
];

/// Where the installer keeps its own files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for preferences and catalog
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the preferences file
    pub fn prefs_file(&self) -> File {
        File::new(self.base_dir.join("prefs.json"))
    }

    /// Get the catalog file
    pub fn catalog_file(&self) -> File {
        File::new(self.base_dir.join("config.json"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Shared data tree used by both applications
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn custom_nodes_dir(&self) -> Dir {
        Dir::new(self.root.join("custom_nodes"))
    }

    pub fn workflows_dir(&self) -> Dir {
        Dir::new(self.root.join("workflows"))
    }

    pub fn models_dir(&self) -> Dir {
        Dir::new(self.root.join("models"))
    }

    /// A model directory such as `controlnet` or `clip_vision/sd`
    pub fn model_dir(&self, name: &str) -> Dir {
        self.models_dir().subdir(name)
    }

    /// Create the data tree
    pub async fn setup(&self) -> Result<(), InstallerError> {
        for dir in DATA_DIRS {
            debug!("Creating {}", dir);
            Dir::new(self.root.join(dir)).create().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(tmp.path().join("data"));
        layout.setup().await.unwrap();

        assert!(layout.custom_nodes_dir().exists().await);
        assert!(layout.model_dir("loras/sdxl").exists().await);
        assert!(layout.model_dir("vae_approx").exists().await);

        // Idempotent
        layout.setup().await.unwrap();
    }
}
