//! Repository clones

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::InstallerError;
use crate::exec;
use crate::utils::name_from_url;

/// Clone `repo_url` into `dest/<name>`, returning the clone path
///
/// An existing target directory is returned as is.
pub async fn clone_repository(repo_url: &str, dest: &Path) -> Result<PathBuf, InstallerError> {
    let name = name_from_url(repo_url);
    if name.is_empty() {
        return Err(InstallerError::FetchFailure(format!(
            "Cannot derive a directory name from {}",
            repo_url
        )));
    }
    let target = dest.join(&name);

    if target.exists() {
        debug!("{} already present at {}", name, target.display());
        return Ok(target);
    }

    tokio::fs::create_dir_all(dest).await?;

    // Large weights are stored with LFS; a missing git-lfs only degrades those clones
    if let Err(e) = exec::run("git", ["lfs", "install"], Some(dest)).await {
        warn!("git lfs install failed: {}", e);
    }

    info!("Cloning {} to {}", repo_url, target.display());
    exec::run(
        "git",
        [
            OsStr::new("clone"),
            OsStr::new("--recurse-submodules"),
            OsStr::new(repo_url),
            target.as_os_str(),
        ],
        Some(dest),
    )
    .await
    .map_err(|e| InstallerError::FetchFailure(format!("git clone {}: {}", repo_url, e)))?;

    Ok(target)
}
