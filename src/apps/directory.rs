/*!
 * Static App Directory
 * In-memory descriptor table, optionally loaded from a JSON manifest
 */

use super::traits::AppDirectory;
use super::types::AppDescriptor;
use crate::core::errors::ConfigError;
use crate::core::types::AppId;
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Default)]
pub struct StaticAppDirectory {
    apps: RwLock<HashMap<AppId, AppDescriptor, RandomState>>,
}

impl StaticAppDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = AppDescriptor>) -> Self {
        let dir = Self::new();
        for desc in descriptors {
            dir.insert(desc);
        }
        dir
    }

    /// Load a JSON array of descriptors
    pub fn from_manifest(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        let descriptors: Vec<AppDescriptor> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: shown.clone(),
                source,
            })?;

        info!(path = %shown, apps = descriptors.len(), "app manifest loaded");
        Ok(Self::from_descriptors(descriptors))
    }

    /// Add or replace a descriptor
    pub fn insert(&self, desc: AppDescriptor) -> Option<AppDescriptor> {
        self.apps.write().insert(desc.id.clone(), desc)
    }

    pub fn remove(&self, id: &str) -> Option<AppDescriptor> {
        self.apps.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.apps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.read().is_empty()
    }
}

impl AppDirectory for StaticAppDirectory {
    fn get_app_by_id(&self, id: &str) -> Option<AppDescriptor> {
        self.apps.read().get(id).cloned()
    }
}
