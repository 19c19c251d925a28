//! Named post-fetch installers

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use manifest_models::InstallItem;

use crate::errors::InstallerError;

/// Item-specific finishing steps run after the generic fetch
#[async_trait]
pub trait CustomInstaller: Send + Sync {
    /// Registry key, as written in manifests
    fn key(&self) -> &str;

    /// Precondition checked before anything is fetched
    async fn check(&self, _item: &InstallItem) -> Result<(), InstallerError> {
        Ok(())
    }

    /// Whether the item's end result is already in place, checked before fetching
    async fn is_installed(&self, _item: &InstallItem) -> bool {
        false
    }

    /// Finish the install of `item`, fetched into `fetched`
    async fn run(&self, item: &InstallItem, fetched: &Path) -> Result<(), InstallerError>;
}

/// Key to installer table
#[derive(Default, Clone)]
pub struct InstallerRegistry {
    installers: HashMap<String, Arc<dyn CustomInstaller>>,
}

impl InstallerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installer under its key, replacing any previous one
    pub fn register(&mut self, installer: Arc<dyn CustomInstaller>) {
        self.installers.insert(installer.key().to_string(), installer);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn CustomInstaller>> {
        self.installers.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.installers.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.installers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for InstallerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallerRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
