//! Preferences file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::InstallerError;
use crate::filesys::file::File;
use crate::utils::unquote;

/// User preferences (`prefs.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Where the applications are installed
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Shared models, custom nodes, workflows and outputs
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Secondary application port
    #[serde(default = "default_auto_port")]
    pub auto_port: u16,

    /// Worker application port
    #[serde(default = "default_comfy_port")]
    pub comfy_port: u16,

    /// Run the worker application on the GPU
    #[serde(default = "default_true", rename = "useNVidia")]
    pub use_nvidia: bool,
}

fn cwd_join(name: &str) -> String {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(name)
        .display()
        .to_string()
}

fn default_root_path() -> String {
    cwd_join("genai")
}

fn default_data_path() -> String {
    cwd_join("genai_data")
}

fn default_auto_port() -> u16 {
    7860
}

fn default_comfy_port() -> u16 {
    7861
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            data_path: default_data_path(),
            auto_port: default_auto_port(),
            comfy_port: default_comfy_port(),
            use_nvidia: true,
        }
    }
}

impl Preferences {
    /// Load preferences, falling back to defaults when the file is missing or unreadable
    pub async fn load(file: &File) -> Self {
        if !file.exists().await {
            debug!("No preferences at {}, using defaults", file.path().display());
            return Self::default();
        }
        match file.read_json::<Preferences>().await {
            Ok(prefs) => prefs.normalized(),
            Err(e) => {
                warn!("Ignoring unreadable preferences {}: {}", file.path().display(), e);
                Self::default()
            }
        }
    }

    /// Persist preferences
    pub async fn save(&self, file: &File) -> Result<(), InstallerError> {
        let contents = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = file.path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        file.write_atomic(&contents).await
    }

    /// Strip quotes from pasted path values
    pub fn normalized(mut self) -> Self {
        self.root_path = unquote(&self.root_path);
        self.data_path = unquote(&self.data_path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&File::new(tmp.path().join("prefs.json"))).await;
        assert_eq!(prefs.comfy_port, 7861);
        assert_eq!(prefs.auto_port, 7860);
        assert!(prefs.use_nvidia);
        assert!(prefs.root_path.ends_with("genai"));
    }

    #[tokio::test]
    async fn test_round_trip_strips_quotes() {
        let tmp = tempfile::tempdir().unwrap();
        let file = File::new(tmp.path().join("prefs.json"));
        file.write_string(r#"{"rootPath":"\"D:\\genai\"","comfyPort":8188,"useNVidia":false}"#)
            .await
            .unwrap();

        let prefs = Preferences::load(&file).await;
        assert_eq!(prefs.root_path, "D:\\genai");
        assert_eq!(prefs.comfy_port, 8188);
        assert!(!prefs.use_nvidia);

        prefs.save(&file).await.unwrap();
        let raw: serde_json::Value = file.read_json().await.unwrap();
        assert_eq!(raw["useNVidia"], serde_json::json!(false));
        assert_eq!(raw["autoPort"], serde_json::json!(7860));
    }
}
