//! Built-in custom installers
//!
//! Extensions whose setup goes beyond a clone and a requirements install.

pub mod large;
pub mod nodes;
pub mod searge;
pub mod was;

use std::sync::Arc;

use crate::app::options::InstallConfig;
use crate::dispatch::registry::InstallerRegistry;
use crate::errors::InstallerError;
use crate::fetch::Fetcher;
use crate::filesys::exists;

impl InstallerRegistry {
    /// Registry holding every built-in installer
    pub fn with_defaults(config: Arc<InstallConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(nodes::EfficiencyInstaller::new(config.clone())));
        registry.register(Arc::new(nodes::ImpactInstaller::new(config.clone())));
        registry.register(Arc::new(nodes::MtbInstaller::new(config.clone(), fetcher.clone())));
        registry.register(Arc::new(searge::SeargeInstaller::new(config.clone())));
        registry.register(Arc::new(was::WasInstaller::new(config.clone())));
        registry.register(Arc::new(large::ControlLoraInstaller::new(config.clone())));
        registry.register(Arc::new(large::IpAdapterInstaller::new(config.clone(), fetcher)));
        registry.register(Arc::new(large::UnclipInstaller::new(config)));
        registry
    }
}

/// Fails with a skip when the worker application is not installed
pub(crate) async fn require_worker(config: &InstallConfig) -> Result<(), InstallerError> {
    let root = config.worker_root();
    if !exists::path_exists(&root).await {
        return Err(InstallerError::NotFound(format!(
            "ComfyUI is required but was not found at {}",
            root.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;

    use crate::errors::InstallerError;
    use crate::fetch::Fetcher;

    /// Fetcher that refuses every transfer
    pub struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn download_file(&self, url: &str, _: &Path, _: Option<&str>) -> Result<PathBuf, InstallerError> {
            Err(InstallerError::FetchFailure(url.to_string()))
        }

        async fn extract(&self, _: &Path, _: &Path) -> Result<(), InstallerError> {
            Ok(())
        }

        async fn clone_repo(&self, url: &str, _: &Path) -> Result<PathBuf, InstallerError> {
            Err(InstallerError::FetchFailure(url.to_string()))
        }

        async fn install_dependencies(&self, _: &Path) -> Result<(), InstallerError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installers::tests_support::NoFetch;

    #[test]
    fn test_defaults_cover_manifest_keys() {
        let registry = InstallerRegistry::with_defaults(Arc::new(InstallConfig::default()), Arc::new(NoFetch));
        assert_eq!(
            registry.keys(),
            vec![
                "controlLoraInstaller",
                "efficiencyInstaller",
                "impactInstaller",
                "ipadapterInstaller",
                "mtbInstaller",
                "seargeInstaller",
                "unclipInstaller",
                "wasInstaller",
            ]
        );
    }

    #[tokio::test]
    async fn test_require_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let config = InstallConfig {
            install_root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let err = require_worker(&config).await.unwrap_err();
        assert!(err.is_skip());

        std::fs::create_dir(config.worker_root()).unwrap();
        require_worker(&config).await.unwrap();
    }
}
