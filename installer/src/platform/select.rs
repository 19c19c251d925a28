//! Version and file selection

use std::fmt;

use platform_models::{ModelInfo, ModelVersion, VersionFile};
use serde_json::{json, Map, Value};

use crate::utils::{extension_of, file_prefix};

/// Extension used for preview images whose URL carries none
const DEFAULT_IMAGE_EXTENSION: &str = "jpeg";

/// Provider version fields copied into the sidecar record, as (provider, sidecar)
pub const VERSION_FIELD_MAP: &[(&str, &str)] = &[
    ("baseModel", "baseModel"),
    ("description", "notes"),
    ("name", "versionName"),
    ("type", "type"),
    ("trainedWords", "trainedWords"),
];

/// Accepted file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Model,
    Negative,
    Archive,
}

impl FileKind {
    /// Kind of a provider file type, case-insensitive
    pub fn from_type(file_type: &str) -> Option<Self> {
        match file_type.to_lowercase().as_str() {
            "model" => Some(FileKind::Model),
            "negative" => Some(FileKind::Negative),
            "archive" => Some(FileKind::Archive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Model => "model",
            FileKind::Negative => "negative",
            FileKind::Archive => "archive",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete downloadable file plus its sidecar data
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub file_name: String,
    pub file_kind: FileKind,
    pub download_url: String,
    pub preview_image_url: Option<String>,
    pub size_kb: f64,
    pub sha256: Option<String>,
    /// Provider-agnostic description; absent for archives
    pub metadata_record: Option<Value>,
}

impl ResolvedAsset {
    /// File name up to the first `.`, used to name the sidecars
    pub fn prefix(&self) -> &str {
        file_prefix(&self.file_name)
    }

    /// `<prefix>.<image extension>`
    pub fn preview_file_name(&self) -> Option<String> {
        self.preview_image_url.as_ref().map(|url| {
            let ext = extension_of(url).unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string());
            format!("{}.{}", self.prefix(), ext)
        })
    }

    pub fn metadata_file_name(&self) -> String {
        format!("{}.json", self.prefix())
    }

    pub fn raw_response_file_name(&self) -> String {
        format!("{}.civitai.info", self.prefix())
    }
}

/// The explicitly requested version, else the first (most recent) one
pub fn select_version(info: &ModelInfo, explicit_version: Option<u64>) -> Option<usize> {
    match explicit_version {
        Some(id) => info.version_index(id),
        None => (!info.model_versions.is_empty()).then_some(0),
    }
}

/// The first file, in provider order, whose type is an accepted kind
pub fn select_file(version: &ModelVersion) -> Option<(&VersionFile, FileKind)> {
    version
        .files
        .iter()
        .find_map(|file| FileKind::from_type(&file.file_type).map(|kind| (file, kind)))
}

/// Sidecar record for a model or negative file
///
/// `raw_version` is the provider's own JSON for the selected version, so
/// mapped fields are copied verbatim whatever their shape.
pub fn metadata_record(
    info: &ModelInfo,
    raw_version: Option<&Value>,
    file: &VersionFile,
    model_id: u64,
    version_id: u64,
) -> Value {
    let mut record = Map::new();
    record.insert("description".into(), json!(info.description));
    let name = if info.name.is_empty() { &file.name } else { &info.name };
    record.insert("name".into(), json!(name));
    record.insert(
        "extensions".into(),
        json!({
            "genai_installer": {
                "version": env!("CARGO_PKG_VERSION"),
                "url": file.download_url,
                "modelId": model_id,
                "versionId": version_id,
            }
        }),
    );

    if let Some(Value::Object(version)) = raw_version {
        for (from, to) in VERSION_FIELD_MAP {
            match version.get(*from) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    record.insert((*to).to_string(), value.clone());
                }
            }
        }
    }

    Value::Object(record)
}

/// Resolve a parsed provider response into an asset
///
/// `None` when the version or an accepted file is missing.
pub fn resolve_asset(
    info: &ModelInfo,
    raw: &Value,
    model_id: u64,
    explicit_version: Option<u64>,
) -> Option<ResolvedAsset> {
    let index = select_version(info, explicit_version)?;
    let version = &info.model_versions[index];
    let (file, kind) = select_file(version)?;

    let metadata_record = match kind {
        FileKind::Archive => None,
        FileKind::Model | FileKind::Negative => {
            let raw_version = raw.get("modelVersions").and_then(|v| v.get(index));
            Some(metadata_record(info, raw_version, file, model_id, version.id))
        }
    };

    Some(ResolvedAsset {
        file_name: file.name.clone(),
        file_kind: kind,
        download_url: file.download_url.clone(),
        preview_image_url: version.images.first().map(|image| image.url.clone()),
        size_kb: file.size_kb,
        sha256: file.hashes.as_ref().and_then(|h| h.sha256.clone()),
        metadata_record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(files: &[(&str, &str)]) -> Value {
        json!({
            "id": 1,
            "files": files
                .iter()
                .map(|(kind, name)| json!({
                    "type": kind,
                    "name": name,
                    "downloadUrl": format!("https://dl.example.com/{}", name),
                }))
                .collect::<Vec<_>>(),
        })
    }

    fn parse(raw: Value) -> ModelVersion {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_negative_selected_without_model() {
        let v = parse(version(&[("Negative", "neg.pt"), ("Archive", "a.zip")]));
        let (file, kind) = select_file(&v).unwrap();
        assert_eq!(kind, FileKind::Negative);
        assert_eq!(file.name, "neg.pt");
    }

    #[test]
    fn test_first_accepted_file_wins_over_later_model() {
        let v = parse(version(&[("Model", "m.safetensors"), ("Archive", "a.zip")]));
        assert_eq!(select_file(&v).unwrap().1, FileKind::Model);

        let v = parse(version(&[("Archive", "pack.zip"), ("Model", "m.safetensors")]));
        let (file, kind) = select_file(&v).unwrap();
        assert_eq!(kind, FileKind::Archive);
        assert_eq!(file.name, "pack.zip");

        let v = parse(version(&[("Negative", "neg.pt"), ("Model", "m.safetensors")]));
        assert_eq!(select_file(&v).unwrap().1, FileKind::Negative);
    }

    #[test]
    fn test_first_of_equal_kind_wins_and_unknown_kinds_ignored() {
        let v = parse(version(&[
            ("Training Data", "data.zip"),
            ("Model", "first.safetensors"),
            ("model", "second.safetensors"),
        ]));
        assert_eq!(select_file(&v).unwrap().0.name, "first.safetensors");

        let v = parse(version(&[("Config", "c.yaml"), ("Training Data", "t.zip")]));
        assert!(select_file(&v).is_none());
    }

    #[test]
    fn test_version_selection() {
        let info: ModelInfo = serde_json::from_value(json!({
            "name": "m",
            "modelVersions": [{ "id": 100 }, { "id": 200 }]
        }))
        .unwrap();

        assert_eq!(select_version(&info, None), Some(0));
        assert_eq!(select_version(&info, Some(200)), Some(1));
        assert_eq!(select_version(&info, Some(300)), None);
    }

    #[test]
    fn test_metadata_record_mapping() {
        let raw = json!({
            "name": "Analog Madness",
            "description": "<p>photoreal</p>",
            "modelVersions": [{
                "id": 100,
                "name": "v7",
                "baseModel": "SD 1.5",
                "description": null,
                "trainedWords": ["analog style"],
                "files": [{ "type": "Model", "name": "analog.v7.safetensors", "downloadUrl": "https://dl/100" }],
                "images": [{ "url": "https://img/abc/preview.png" }]
            }]
        });
        let info: ModelInfo = serde_json::from_value(raw.clone()).unwrap();

        let asset = resolve_asset(&info, &raw, 8030, None).unwrap();
        assert_eq!(asset.prefix(), "analog");
        assert_eq!(asset.preview_file_name().as_deref(), Some("analog.png"));
        assert_eq!(asset.raw_response_file_name(), "analog.civitai.info");

        let record = asset.metadata_record.unwrap();
        assert_eq!(record["name"], "Analog Madness");
        assert_eq!(record["versionName"], "v7");
        assert_eq!(record["baseModel"], "SD 1.5");
        assert_eq!(record["trainedWords"], json!(["analog style"]));
        assert!(record.get("notes").is_none());
        assert_eq!(record["extensions"]["genai_installer"]["modelId"], 8030);
    }

    #[test]
    fn test_archive_has_no_record() {
        let raw = json!({
            "name": "Pack",
            "modelVersions": [{
                "id": 5,
                "files": [{ "type": "Archive", "name": "pack.zip", "downloadUrl": "https://dl/5" }]
            }]
        });
        let info: ModelInfo = serde_json::from_value(raw.clone()).unwrap();
        let asset = resolve_asset(&info, &raw, 1, None).unwrap();
        assert_eq!(asset.file_kind, FileKind::Archive);
        assert!(asset.metadata_record.is_none());
        assert!(asset.preview_image_url.is_none());
    }
}
