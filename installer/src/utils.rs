//! Utility functions

use std::path::Path;

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::exec;

/// Version information for the installer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Hex encoding utilities
pub mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        let mut result = String::with_capacity(data.len() * 2);
        for byte in data {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}

/// Last non-empty path segment of a URL, without query or fragment
pub fn last_segment(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
            .to_string(),
        Err(_) => url
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Directory name a repository or archive URL unpacks to
///
/// `https://github.com/ltdrdata/ComfyUI-Manager.git` -> `ComfyUI-Manager`
pub fn name_from_url(url: &str) -> String {
    let segment = last_segment(url);
    segment
        .strip_suffix(".git")
        .or_else(|| segment.strip_suffix(".zip"))
        .unwrap_or(&segment)
        .to_string()
}

/// File name up to the first `.`
pub fn file_prefix(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Extension after the last `.` of the URL's path
pub fn extension_of(url: &str) -> Option<String> {
    let segment = last_segment(url);
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| !ext.is_empty())
}

/// Strip the quotes pasted paths tend to carry
pub fn unquote(value: &str) -> String {
    value.trim().replace('"', "")
}

/// Host report printed by `diagnostic`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub version: VersionInfo,
    pub os: String,
    pub hostname: String,
    pub cpu_count: usize,
    pub memory_total_mb: u64,
    pub memory_available_mb: u64,
    pub data_root: String,
    pub data_disk_free_gb: Option<f64>,
    pub git_available: bool,
    pub seven_zip_available: bool,
    pub ffmpeg_available: bool,
}

/// Collect the host report
pub async fn run_diagnostic(data_root: &Path, seven_zip: &str) -> DiagnosticReport {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let probe_path = if data_root.is_absolute() {
        data_root.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(data_root)
    };
    // Longest mount point containing the data root
    let data_disk_free_gb = disks
        .list()
        .iter()
        .filter(|d| probe_path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space() as f64 / 1024.0 / 1024.0 / 1024.0);

    DiagnosticReport {
        version: version_info(),
        os: System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        cpu_count: sys.cpus().len(),
        memory_total_mb: sys.total_memory() / 1024 / 1024,
        memory_available_mb: sys.available_memory() / 1024 / 1024,
        data_root: data_root.display().to_string(),
        data_disk_free_gb,
        git_available: exec::probe("git", &["--version"]).await,
        seven_zip_available: exec::probe(seven_zip, &["i"]).await,
        ffmpeg_available: exec::probe("ffmpeg", &["-version"]).await,
    }
}
