//! Catalog model collections

use std::fmt;
use std::str::FromStr;

use manifest_models::Catalog;
use tracing::{error, info, warn};

use crate::dispatch::{Dispatcher, ItemReport};

const DEFAULT_COLLECTIONS: [&str; 3] = ["embeddings", "workflows", "vae"];
const SD_COLLECTIONS: [&str; 3] = ["controlnets", "checkpoints", "loras"];
const SDXL_COLLECTIONS: [&str; 3] = ["controlnetsXL", "checkpointsXL", "lorasXL"];

/// Which model family to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSet {
    Sd,
    Sdxl,
    All,
}

impl ModelSet {
    /// Collection names in load order
    pub fn collections(&self) -> Vec<&'static str> {
        let mut names = DEFAULT_COLLECTIONS.to_vec();
        if matches!(self, ModelSet::Sd | ModelSet::All) {
            names.extend(SD_COLLECTIONS);
        }
        if matches!(self, ModelSet::Sdxl | ModelSet::All) {
            names.extend(SDXL_COLLECTIONS);
        }
        names
    }
}

impl FromStr for ModelSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sd" => Ok(ModelSet::Sd),
            "sdxl" => Ok(ModelSet::Sdxl),
            "all" => Ok(ModelSet::All),
            _ => Err(format!("Invalid model set: {} (expected sd, sdxl or all)", s)),
        }
    }
}

impl fmt::Display for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelSet::Sd => "sd",
            ModelSet::Sdxl => "sdxl",
            ModelSet::All => "all",
        };
        f.write_str(name)
    }
}

/// Items of one collection, as processed
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub name: String,
    pub items: Vec<ItemReport>,
}

/// Process each collection of `set` in order; a broken collection does not stop the rest
pub async fn load_models(dispatcher: &Dispatcher, catalog: &Catalog, set: ModelSet) -> Vec<CollectionReport> {
    let mut reports = Vec::new();
    for name in set.collections() {
        let manifest = match catalog.collection(name) {
            Some(Ok(manifest)) => manifest,
            Some(Err(e)) => {
                error!("Collection {} could not be read: {}", name, e);
                continue;
            }
            None => {
                warn!("Collection {} is not in the catalog", name);
                continue;
            }
        };

        info!("Loading {}", name.to_uppercase());
        let items = dispatcher.process_items(manifest.items(), false).await;
        reports.push(CollectionReport {
            name: name.to_string(),
            items,
        });
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_order() {
        assert_eq!(
            ModelSet::Sd.collections(),
            ["embeddings", "workflows", "vae", "controlnets", "checkpoints", "loras"]
        );
        assert_eq!(ModelSet::All.collections().len(), 9);
        assert_eq!(ModelSet::All.collections()[8], "lorasXL");
        assert_eq!("SDXL".parse::<ModelSet>().unwrap(), ModelSet::Sdxl);
        assert!("sd2".parse::<ModelSet>().is_err());
    }
}
