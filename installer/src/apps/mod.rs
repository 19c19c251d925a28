//! Application lifecycle commands built on the dispatcher

pub mod auto1111;
pub mod comfy;
pub mod cuda;
pub mod ffmpeg;
pub mod models;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::dispatch::ItemReport;
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::dir::Dir;

/// Result of an application-level install
#[derive(Debug, Clone)]
pub enum AppOutcome {
    /// Present already and no reinstall was requested
    AlreadyInstalled,

    /// Installed, with the reports of any extensions installed alongside
    Installed(Vec<ItemReport>),
}

/// Download `url` into a fresh directory under `staging` and unpack it there
///
/// The caller owns the returned directory and removes it when done.
pub(crate) async fn fetch_unpacked(
    fetcher: &dyn Fetcher,
    url: &str,
    staging: &Path,
    prefix: &str,
) -> Result<Dir, InstallerError> {
    let work = Dir::create_temp_dir(staging, prefix).await?;
    info!("Downloading {}", url);
    let archive = fetcher.fetch_archive(url, work.path()).await?;
    fetcher.extract(&archive, work.path()).await?;
    Ok(work)
}

/// `url` from the catalog, or a configuration error naming the missing key
pub(crate) fn catalog_url<'a>(url: &'a Option<String>, key: &str) -> Result<&'a str, InstallerError> {
    url.as_deref()
        .ok_or_else(|| InstallerError::ConfigError(format!("{} is missing from the catalog", key)))
}

/// Empty `dir` when it exists
pub(crate) async fn clear(dir: &Path) -> Result<(), InstallerError> {
    let dir = Dir::new(dir);
    if dir.exists().await {
        info!("Removing contents of {}", dir.path().display());
        dir.empty().await?;
    }
    Ok(())
}

/// Move `src` onto `dest`, which must be missing or empty
pub(crate) async fn move_tree(src: &Path, dest: &Path) -> Result<PathBuf, InstallerError> {
    if Dir::new(dest).exists().await {
        Dir::new(dest).delete().await?;
    }
    Ok(Dir::new(src).move_to(dest).await?.path().to_path_buf())
}
