//! Manifest and catalog models

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How the payload of an item is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Plain download, extracted when it is an archive
    #[serde(rename = "archive", alias = "get")]
    Archive,

    /// Version-control clone; large-install entries omit the kind
    #[default]
    #[serde(rename = "repository", alias = "git")]
    Repository,

    /// Resolved through the content platform
    #[serde(rename = "content-platform", alias = "civitai")]
    ContentPlatform,
}

/// Dispatch grouping of manifest items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    #[serde(rename = "unattended", alias = "none")]
    Unattended,

    #[serde(rename = "dependency-setup", alias = "basic")]
    DependencySetup,

    #[serde(rename = "custom")]
    Custom,
}

impl Phase {
    /// All phases in install order
    pub const ALL: [Phase; 3] = [Phase::Unattended, Phase::DependencySetup, Phase::Custom];

    /// Whether the worker application must be cycled once the phase completes
    pub fn requires_supervised_boot(&self) -> bool {
        matches!(self, Phase::DependencySetup | Phase::Custom)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unattended => "unattended",
            Phase::DependencySetup => "dependency-setup",
            Phase::Custom => "custom",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unattended" | "none" => Ok(Phase::Unattended),
            "dependency-setup" | "basic" => Ok(Phase::DependencySetup),
            "custom" => Ok(Phase::Custom),
            _ => Err(format!("Invalid phase: {}", s)),
        }
    }
}

/// Configured root a destination subpath is relative to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRoot {
    /// Shared data root (models, custom nodes, workflows)
    #[default]
    Data,

    /// Worker application install root
    App,

    /// Scratch directory, removed by the installer that consumes it
    Staging,
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallItem {
    #[serde(default, alias = "type")]
    pub kind: ItemKind,

    #[serde(default, alias = "path")]
    pub destination_subpath: String,

    #[serde(default, alias = "url", alias = "modelUrl", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default, alias = "modelId", skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<u64>,

    #[serde(default, alias = "note", alias = "name")]
    pub label: String,

    #[serde(default, alias = "setup")]
    pub phase: Phase,

    #[serde(default, alias = "installer", skip_serializing_if = "Option::is_none")]
    pub installer_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,

    /// Directory the search term is matched in, defaults to the destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_subpath: Option<String>,

    #[serde(default)]
    pub root: ItemRoot,

    #[serde(default, alias = "reqs", deserialize_with = "de_flag")]
    pub install_dependencies: bool,

    #[serde(default, alias = "nodeUrl", skip_serializing_if = "Option::is_none")]
    pub companion_url: Option<String>,

    #[serde(default, alias = "size", skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<f64>,
}

impl InstallItem {
    /// Label used in log lines, falling back to the fetch target
    pub fn display_name(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        match (&self.source_url, self.platform_id) {
            (Some(url), _) => url.clone(),
            (None, Some(id)) => format!("model {}", id),
            (None, None) => "<unnamed item>".to_string(),
        }
    }

    /// Subpath the search term is matched in
    pub fn search_subpath(&self) -> &str {
        self.search_subpath
            .as_deref()
            .unwrap_or(&self.destination_subpath)
    }
}

/// Legacy catalogs mark `reqs` with any value, including strings
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => b,
        _ => true,
    })
}

/// Ordered list of install items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    items: Vec<InstallItem>,
}

impl Manifest {
    pub fn new(items: Vec<InstallItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[InstallItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items tagged with exactly `phase`, in manifest order
    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &InstallItem> {
        self.items.iter().filter(move |item| item.phase == phase)
    }

    /// Items whose source URL contains `fragment`
    pub fn with_source_containing(&self, fragment: &str) -> Manifest {
        Manifest::new(
            self.items
                .iter()
                .filter(|item| {
                    item.source_url
                        .as_deref()
                        .is_some_and(|url| url.contains(fragment))
                })
                .cloned()
                .collect(),
        )
    }

    /// Items whose label is one of `labels`; all items when `labels` is empty
    pub fn with_labels(&self, labels: &[String]) -> Manifest {
        if labels.is_empty() {
            return self.clone();
        }
        Manifest::new(
            self.items
                .iter()
                .filter(|item| labels.iter().any(|l| l.eq_ignore_ascii_case(&item.label)))
                .cloned()
                .collect(),
        )
    }
}

impl From<Vec<InstallItem>> for Manifest {
    fn from(items: Vec<InstallItem>) -> Self {
        Self::new(items)
    }
}

/// Installer catalog (`config.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub comfy_installer_url: Option<String>,

    #[serde(default)]
    pub auto_installer_url: Option<String>,

    #[serde(default)]
    pub ffmpeg_install_url: Option<String>,

    /// Extension manifest for the worker application
    #[serde(default)]
    pub custom_nodes: Manifest,

    /// Extension repositories for the secondary application
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub large_installs: Manifest,

    /// Named model collections (`embeddings`, `checkpointsXL`, ...)
    #[serde(flatten)]
    pub collections: BTreeMap<String, serde_json::Value>,
}

impl Catalog {
    /// Parse the named collection; `None` when the catalog does not define it
    pub fn collection(&self, name: &str) -> Option<Result<Manifest, serde_json::Error>> {
        self.collections
            .get(name)
            .map(|value| serde_json::from_value(value.clone()))
    }
}
