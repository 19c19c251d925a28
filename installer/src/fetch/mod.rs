//! Fetch primitives
//!
//! The install core only talks to the network, version control and the
//! package installer through [`Fetcher`]; [`DefaultFetcher`] is the shipped
//! implementation.

pub mod archive;
pub mod download;
pub mod git;
pub mod python;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::options::InstallConfig;
use crate::errors::InstallerError;

/// Transfer operations consumed by the dispatcher and the content resolver
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dir`, optionally under a fixed file name
    async fn download_file(
        &self,
        url: &str,
        dir: &Path,
        name: Option<&str>,
    ) -> Result<PathBuf, InstallerError>;

    /// Download an archive into `dir`
    async fn fetch_archive(&self, url: &str, dir: &Path) -> Result<PathBuf, InstallerError> {
        self.download_file(url, dir, None).await
    }

    /// Unpack `archive` into `dest`
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), InstallerError>;

    /// Clone a repository into `dest`, returning the clone path
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<PathBuf, InstallerError>;

    /// Install a repository's interpreter dependencies
    async fn install_dependencies(&self, repo: &Path) -> Result<(), InstallerError>;
}

/// Network, git and pip backed fetcher
pub struct DefaultFetcher {
    client: Client,
    interpreter: PathBuf,
    seven_zip: String,
    show_progress: bool,
}

impl DefaultFetcher {
    pub fn new(config: &InstallConfig, show_progress: bool) -> Result<Self, InstallerError> {
        // Multi-gigabyte transfers; only the connection phase is bounded
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("genai-installer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            interpreter: config.interpreter_path(),
            seven_zip: config.seven_zip.clone(),
            show_progress,
        })
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    async fn download_file(
        &self,
        url: &str,
        dir: &Path,
        name: Option<&str>,
    ) -> Result<PathBuf, InstallerError> {
        download::download(&self.client, url, dir, name, self.show_progress).await
    }

    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), InstallerError> {
        archive::extract(archive, dest, &self.seven_zip).await
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<PathBuf, InstallerError> {
        git::clone_repository(url, dest).await
    }

    async fn install_dependencies(&self, repo: &Path) -> Result<(), InstallerError> {
        python::install_requirements(&self.interpreter, repo).await
    }
}
