//! Post-clone steps for custom node packs

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use manifest_models::InstallItem;
use tracing::info;

use crate::app::options::InstallConfig;
use crate::dispatch::registry::CustomInstaller;
use crate::errors::InstallerError;
use crate::exec;
use crate::fetch::python::pip_install;
use crate::fetch::Fetcher;

/// Efficiency Nodes: expression evaluator dependency
pub struct EfficiencyInstaller {
    config: Arc<InstallConfig>,
}

impl EfficiencyInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CustomInstaller for EfficiencyInstaller {
    fn key(&self) -> &str {
        "efficiencyInstaller"
    }

    async fn run(&self, _item: &InstallItem, _fetched: &Path) -> Result<(), InstallerError> {
        pip_install(&self.config.interpreter_path(), &["simpleeval"]).await
    }
}

/// Impact Pack: bundled non-interactive install script
pub struct ImpactInstaller {
    config: Arc<InstallConfig>,
}

impl ImpactInstaller {
    pub fn new(config: Arc<InstallConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CustomInstaller for ImpactInstaller {
    fn key(&self) -> &str {
        "impactInstaller"
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        let script = fetched.join("install.py");
        exec::run(
            self.config.interpreter_path(),
            [script.as_os_str(), OsStr::new("-y")],
            Some(fetched),
        )
        .await
    }
}

/// Model selection fed to the MTB model download prompt
const MTB_MODEL_CHOICES: &str = "1, 2, 3, 4\n";

/// MTB: requirements plus the optional model download
pub struct MtbInstaller {
    config: Arc<InstallConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl MtbInstaller {
    pub fn new(config: Arc<InstallConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl CustomInstaller for MtbInstaller {
    fn key(&self) -> &str {
        "mtbInstaller"
    }

    async fn run(&self, _item: &InstallItem, fetched: &Path) -> Result<(), InstallerError> {
        let interpreter = self.config.interpreter_path();
        self.fetcher.install_dependencies(fetched).await?;

        let scripts = fetched.join("scripts");
        exec::run_with_input(
            &interpreter,
            ["download_models.py"],
            Some(&scripts),
            MTB_MODEL_CHOICES,
        )
        .await?;

        info!(
            "Some MTB nodes need extra packages: \"{}\" -m pip install tensorflow facexlib insightface basicsr",
            interpreter.display()
        );
        Ok(())
    }
}
