//! Application state management

use std::sync::Arc;

use manifest_models::Catalog;
use secrecy::SecretString;
use tracing::info;

use crate::app::options::InstallConfig;
use crate::apps::auto1111::SecondaryApp;
use crate::apps::comfy::WorkerApp;
use crate::dispatch::{Dispatcher, InstallerRegistry};
use crate::errors::InstallerError;
use crate::fetch::{DefaultFetcher, Fetcher};
use crate::http::client::HttpClient;
use crate::platform::ContentResolver;
use crate::storage::layout::StorageLayout;
use crate::supervisor::{AppBooter, AppSupervisor};

/// Main application state
pub struct AppState {
    /// Resolved configuration, shared read-only
    pub config: Arc<InstallConfig>,

    /// Where preferences and the catalog live
    pub layout: StorageLayout,

    /// Network, git and pip operations
    pub fetcher: Arc<dyn Fetcher>,

    /// Manifest dispatch
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Initialize application state
    pub fn init(
        config: InstallConfig,
        layout: StorageLayout,
        platform_token: Option<SecretString>,
        show_progress: bool,
    ) -> Result<Self, InstallerError> {
        info!("Initializing installer state...");
        let config = Arc::new(config);

        let fetcher: Arc<dyn Fetcher> = Arc::new(DefaultFetcher::new(&config, show_progress)?);

        let http = match platform_token {
            Some(token) => HttpClient::with_token(&config.platform_url, token)?,
            None => HttpClient::new(&config.platform_url)?,
        };
        let resolver = Arc::new(ContentResolver::new(
            http,
            fetcher.clone(),
            config.staging_dir.clone(),
        ));

        let registry = Arc::new(InstallerRegistry::with_defaults(config.clone(), fetcher.clone()));
        let booter: Arc<dyn AppBooter> = Arc::new(AppSupervisor::new(config.clone(), show_progress));

        let dispatcher = Arc::new(Dispatcher::new(
            config.clone(),
            fetcher.clone(),
            resolver,
            registry,
            booter,
        ));

        Ok(Self {
            config,
            layout,
            fetcher,
            dispatcher,
        })
    }

    /// Read the installer catalog
    pub async fn catalog(&self) -> Result<Catalog, InstallerError> {
        let file = self.layout.catalog_file();
        if !file.exists().await {
            return Err(InstallerError::ConfigError(format!(
                "catalog not found at {}",
                file.path().display()
            )));
        }
        file.read_json().await
    }

    pub fn worker_app(&self) -> WorkerApp {
        WorkerApp::new(self.config.clone(), self.fetcher.clone(), self.dispatcher.clone())
    }

    pub fn secondary_app(&self) -> SecondaryApp {
        SecondaryApp::new(self.config.clone(), self.fetcher.clone())
    }
}
