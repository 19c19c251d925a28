//! Bundled ffmpeg binaries

use std::path::{Path, PathBuf};
use std::sync::Arc;

use manifest_models::Catalog;
use tracing::info;

use crate::app::options::InstallConfig;
use crate::apps::{catalog_url, clear, fetch_unpacked, move_tree, AppOutcome};
use crate::errors::InstallerError;
use crate::exec;
use crate::fetch::Fetcher;
use crate::filesys::exists;

/// Whether an `ffmpeg` on PATH runs
pub async fn ffmpeg_available() -> bool {
    exec::probe("ffmpeg", &["-version"]).await
}

/// The `bin` folder of the extracted build inside `dir`
pub async fn locate_bin(dir: &Path) -> Option<PathBuf> {
    for candidate in exists::search_for(dir, "ffmpeg").await {
        let bin = candidate.join("bin");
        if exists::path_exists(&bin).await {
            return Some(bin);
        }
    }
    None
}

pub async fn install_ffmpeg(
    config: &InstallConfig,
    fetcher: Arc<dyn Fetcher>,
    catalog: &Catalog,
    reinstall: bool,
) -> Result<AppOutcome, InstallerError> {
    let target = config.ffmpeg_dir();
    if ffmpeg_available().await {
        if !reinstall {
            info!("FFmpeg already installed");
            return Ok(AppOutcome::AlreadyInstalled);
        }
        clear(&target).await?;
    }

    let url = catalog_url(&catalog.ffmpeg_install_url, "ffmpegInstallUrl")?;
    let work = fetch_unpacked(fetcher.as_ref(), url, &config.staging_dir, "ffmpeg").await?;
    let Some(bin) = locate_bin(work.path()).await else {
        work.delete().await?;
        return Err(InstallerError::FetchFailure(format!(
            "{} did not contain an ffmpeg bin folder",
            url
        )));
    };

    move_tree(&bin, &target).await?;
    work.delete().await?;

    info!("Install complete: FFmpeg. Add {} to your PATH", target.display());
    Ok(AppOutcome::Installed(Vec::new()))
}
