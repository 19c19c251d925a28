//! Content platform API models

use serde::{Deserialize, Serialize};

/// Model metadata returned by `GET /models/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub model_type: Option<String>,
    /// Versions, most recent first
    pub model_versions: Vec<ModelVersion>,
}

impl ModelInfo {
    /// Position of the version with the given id
    pub fn version_index(&self, version_id: u64) -> Option<usize> {
        self.model_versions.iter().position(|v| v.id == version_id)
    }
}

/// A published version of a model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trained_words: Vec<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
    #[serde(default)]
    pub images: Vec<ModelImage>,
}

/// A downloadable file attached to a version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    #[serde(rename = "type")]
    pub file_type: String,
    pub name: String,
    pub download_url: String,
    #[serde(default, rename = "sizeKB")]
    pub size_kb: f64,
    #[serde(default)]
    pub hashes: Option<FileHashes>,
}

/// Digests published for a file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileHashes {
    #[serde(default, rename = "SHA256")]
    pub sha256: Option<String>,
}

/// Preview image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelImage {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_info() {
        let raw = serde_json::json!({
            "id": 8030,
            "name": "Analog Madness",
            "description": null,
            "type": "Checkpoint",
            "modelVersions": [{
                "id": 100,
                "name": "v1",
                "baseModel": "SD 1.5",
                "trainedWords": ["analog"],
                "files": [{
                    "type": "Model",
                    "name": "analog.safetensors",
                    "downloadUrl": "https://example.com/dl/100",
                    "sizeKB": 2048.5,
                    "hashes": { "SHA256": "ABCD" }
                }],
                "images": [{ "url": "https://example.com/img/1.jpeg" }]
            }]
        });

        let info: ModelInfo = serde_json::from_value(raw).unwrap();
        assert_eq!(info.name, "Analog Madness");
        assert_eq!(info.model_versions[0].files[0].size_kb, 2048.5);
        assert_eq!(info.version_index(100), Some(0));
        assert_eq!(info.version_index(200), None);
    }

    #[test]
    fn test_missing_versions_is_an_error() {
        let raw = serde_json::json!({ "name": "broken" });
        assert!(serde_json::from_value::<ModelInfo>(raw).is_err());
    }
}
