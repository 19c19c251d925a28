//! WAS Node Suite: point its video nodes at the bundled ffmpeg

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use manifest_models::InstallItem;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::app::options::InstallConfig;
use crate::dispatch::registry::CustomInstaller;
use crate::errors::InstallerError;
use crate::filesys::exists;
use crate::filesys::file::File;

const CONFIG_FILE: &str = "was_suite_config.json";
const FFMPEG_KEY: &str = "ffmpeg_bin_path";

/// Set the ffmpeg path in the suite config, creating the file when missing
///
/// The file is rewritten with four-space indentation.
pub async fn patch_was_config(path: &Path, ffmpeg_dir: &Path) -> Result<(), InstallerError> {
    let file = File::new(path);
    let mut config: Value = if file.exists().await {
        file.read_json().await?
    } else {
        Value::Object(Map::new())
    };

    let Some(fields) = config.as_object_mut() else {
        return Err(InstallerError::ConfigError(format!(
            "{} is not a JSON object",
            path.display()
        )));
    };
    fields.insert(
        FFMPEG_KEY.to_string(),
        Value::String(ffmpeg_dir.display().to_string()),
    );

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config.serialize(&mut ser)?;
    file.write_bytes(&buf).await
}

pub struct WasInstaller {
    config: Arc<InstallConfig>,
}

impl WasInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CustomInstaller for WasInstaller {
    fn key(&self) -> &str {
        "wasInstaller"
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        let ffmpeg = self.config.ffmpeg_dir();
        if !exists::path_exists(&ffmpeg).await {
            warn!("WAS Video Nodes require ffmpeg; install it and rerun to enable them");
            return Ok(());
        }

        patch_was_config(&fetched.join(CONFIG_FILE), &ffmpeg).await?;
        info!("WAS Node Suite configured with ffmpeg at {}", ffmpeg.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_patch_keeps_other_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"run_requirements": true, "ffmpeg_bin_path": "/path/to/ffmpeg"}"#).unwrap();

        patch_was_config(&path, Path::new("/opt/genai/ffmpeg")).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n    \"ffmpeg_bin_path\": \"/opt/genai/ffmpeg\""));
        let value: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["run_requirements"], true);
    }

    #[tokio::test]
    async fn test_patch_creates_missing_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);

        patch_was_config(&path, Path::new("ffmpeg")).await.unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[FFMPEG_KEY], "ffmpeg");
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = InstallConfig {
            install_root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let item: InstallItem = serde_json::from_value(serde_json::json!({"url": "https://x/was.git"})).unwrap();

        WasInstaller::new(Arc::new(config)).run(&item, tmp.path()).await.unwrap();
        assert!(!tmp.path().join(CONFIG_FILE).exists());
    }
}
