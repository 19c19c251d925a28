//! Manifest-driven install dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use manifest_models::{InstallItem, ItemKind, Manifest, Phase};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app::options::InstallConfig;
use crate::dispatch::registry::{CustomInstaller, InstallerRegistry};
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::dir::Dir;
use crate::filesys::exists;
use crate::platform::{ContentOutcome, ContentResolver};
use crate::supervisor::{AppBooter, RunReport};
use crate::utils::{last_segment, name_from_url};

/// Folder in fetched extensions holding example workflows
const WORKFLOWS_SUBFOLDER: &str = "workflows";

/// How a single item ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ItemStatus {
    Installed,
    AlreadyInstalled,
    Skipped(String),
    Failed(String),
}

/// Per-item line of a phase result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub label: String,
    pub status: ItemStatus,
}

/// Outcome of one dispatched phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub items: Vec<ItemReport>,
    /// Supervised boot run after the items, when the phase needs one
    pub boot: Option<RunReport>,
}

impl PhaseResult {
    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn installed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Installed))
    }

    pub fn already_installed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::AlreadyInstalled))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed(_)))
    }

    /// Some items failed; the rest were still processed
    pub fn is_partial(&self) -> bool {
        self.failed() > 0
    }
}

/// Routes manifest items to their handlers
pub struct Dispatcher {
    config: Arc<InstallConfig>,
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<ContentResolver>,
    registry: Arc<InstallerRegistry>,
    booter: Arc<dyn AppBooter>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<InstallConfig>,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<ContentResolver>,
        registry: Arc<InstallerRegistry>,
        booter: Arc<dyn AppBooter>,
    ) -> Self {
        Self {
            config,
            fetcher,
            resolver,
            registry,
            booter,
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn booter(&self) -> &Arc<dyn AppBooter> {
        &self.booter
    }

    /// Process every item tagged `phase`, then cycle the application if the phase requires it
    pub async fn run_phase(&self, manifest: &Manifest, phase: Phase) -> PhaseResult {
        let items: Vec<&InstallItem> = manifest.for_phase(phase).collect();
        info!("Phase {}: {} items", phase, items.len());

        let reports = self.process_items(items, phase == Phase::Custom).await;

        let boot = if phase.requires_supervised_boot() {
            self.boot(self.config.boot.timeout).await
        } else {
            None
        };

        PhaseResult {
            phase,
            items: reports,
            boot,
        }
    }

    /// One supervised cycle; failures are logged, never returned
    pub async fn boot(&self, timeout: std::time::Duration) -> Option<RunReport> {
        match self.booter.cycle(timeout).await {
            Ok(report) => {
                if let Err(e) = report.check() {
                    warn!("{}; application was stopped, continuing", e);
                }
                Some(report)
            }
            Err(e) => {
                warn!("Supervised boot failed: {}", e);
                None
            }
        }
    }

    /// Process items in order; `custom` adds workflow copying and the registry step
    pub async fn process_items<'a, I>(&self, items: I, custom: bool) -> Vec<ItemReport>
    where
        I: IntoIterator<Item = &'a InstallItem>,
    {
        let mut reports = Vec::new();
        for item in items {
            let label = item.display_name();
            let status = match self.process_item(item, custom).await {
                Ok(status) => status,
                Err(e) if e.is_skip() => {
                    warn!("Skipping {}: {}", label, e);
                    ItemStatus::Skipped(e.to_string())
                }
                Err(e) => {
                    error!("Failed to install {}: {}", label, e);
                    ItemStatus::Failed(e.to_string())
                }
            };
            reports.push(ItemReport { label, status });
        }
        reports
    }

    async fn process_item(&self, item: &InstallItem, custom: bool) -> Result<ItemStatus, InstallerError> {
        let installer = match custom {
            true => Some(self.resolve_installer(item).await?),
            false => None,
        };
        if let Some(installer) = &installer {
            if installer.is_installed(item).await {
                info!("{} already installed", item.display_name());
                return Ok(ItemStatus::AlreadyInstalled);
            }
        }

        if let Some(term) = &item.search_term {
            let dir = self.config.search_dir(item);
            if exists::contains_match(&dir, term).await {
                info!("{} already installed ({} found in {})", item.display_name(), term, dir.display());
                return Ok(ItemStatus::AlreadyInstalled);
            }
        }

        let dest = self.config.destination(item);
        let (status, fetched) = match item.kind {
            ItemKind::Repository => self.install_repository(item, &dest).await?,
            ItemKind::Archive => self.install_archive(item, &dest).await?,
            ItemKind::ContentPlatform => self.install_content(item, &dest).await?,
        };

        if status == ItemStatus::AlreadyInstalled {
            return Ok(status);
        }

        if let Some(installer) = installer {
            self.copy_workflows(item, &fetched).await?;
            info!("Running {} for {}", installer.key(), item.display_name());
            installer.run(item, &fetched).await?;
        }

        Ok(status)
    }

    async fn resolve_installer(&self, item: &InstallItem) -> Result<Arc<dyn CustomInstaller>, InstallerError> {
        let key = item.installer_key.as_deref().ok_or_else(|| {
            InstallerError::UnresolvedInstaller(format!("{} has no installer key", item.display_name()))
        })?;
        let installer = self
            .registry
            .get(key)
            .ok_or_else(|| InstallerError::UnresolvedInstaller(key.to_string()))?;
        installer.check(item).await?;
        Ok(installer)
    }

    fn source_url<'a>(&self, item: &'a InstallItem) -> Result<&'a str, InstallerError> {
        item.source_url
            .as_deref()
            .ok_or_else(|| InstallerError::NotFound(format!("{} has no source url", item.display_name())))
    }

    async fn install_repository(
        &self,
        item: &InstallItem,
        dest: &Path,
    ) -> Result<(ItemStatus, PathBuf), InstallerError> {
        let url = self.source_url(item)?;
        let target = dest.join(name_from_url(url));
        if exists::path_exists(&target).await {
            info!("{} already installed", item.display_name());
            return Ok((ItemStatus::AlreadyInstalled, target));
        }

        let path = self.fetcher.clone_repo(url, dest).await?;
        if item.install_dependencies {
            self.fetcher.install_dependencies(&path).await?;
        }
        Ok((ItemStatus::Installed, path))
    }

    async fn install_archive(
        &self,
        item: &InstallItem,
        dest: &Path,
    ) -> Result<(ItemStatus, PathBuf), InstallerError> {
        let url = self.source_url(item)?;
        let file_name = last_segment(url);
        let unpacked = name_from_url(url);
        for candidate in [&file_name, &unpacked] {
            if !candidate.is_empty() && exists::path_exists(&dest.join(candidate)).await {
                info!("{} already exists in {}", candidate, dest.display());
                return Ok((ItemStatus::AlreadyInstalled, dest.to_path_buf()));
            }
        }

        let archive = self.fetcher.fetch_archive(url, dest).await?;
        self.fetcher.extract(&archive, dest).await?;
        Ok((ItemStatus::Installed, dest.to_path_buf()))
    }

    async fn install_content(
        &self,
        item: &InstallItem,
        dest: &Path,
    ) -> Result<(ItemStatus, PathBuf), InstallerError> {
        match self.resolver.install(item, dest).await? {
            ContentOutcome::Installed(path) => Ok((ItemStatus::Installed, path)),
            ContentOutcome::AlreadyInstalled(path) => Ok((ItemStatus::AlreadyInstalled, path)),
        }
    }

    /// Copy a fetched `workflows` folder into the shared workflow folder
    async fn copy_workflows(&self, item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        let source = Dir::new(fetched.join(WORKFLOWS_SUBFOLDER));
        if !source.exists().await {
            return Ok(());
        }

        let name = match &item.source_url {
            Some(url) => name_from_url(url),
            None => item.display_name(),
        };
        let target = self.config.data_layout().workflows_dir().subdir(&name);
        info!("Copying workflows from {} to {}", source.path().display(), target.path().display());
        source.copy_to(target.path()).await
    }
}
