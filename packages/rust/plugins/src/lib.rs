//! Content-model plugins for htmlcmd.
//!
//! This crate provides:
//! - [`Plugin`]: an async transformation over a [`ContentModel`]
//! - [`PluginManager`]: the explicit registry the pipeline looks plugins up in
//! - [`ImageDownloader`]: the built-in `image_downloader` plugin

mod image_downloader;

use std::sync::Arc;

use tracing::debug;

use htmlcmd_shared::{ContentModel, PluginsConfig, Result};

pub use image_downloader::ImageDownloader;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A named transformation applied to a content model after parsing.
///
/// Implementations take the model by value and return the transformed model.
/// Returning an error leaves the caller's pre-plugin model in effect.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Registry key, e.g. `image_downloader`.
    fn name(&self) -> &str;

    /// One-line human-readable description.
    fn description(&self) -> &str;

    async fn process_content(&self, model: ContentModel) -> Result<ContentModel>;
}

/// Name and description of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered plugins in registration order.
#[derive(Default, Clone)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in plugin.
    pub fn with_builtins(config: &PluginsConfig) -> Result<Self> {
        let mut manager = Self::new();
        manager.register(Arc::new(ImageDownloader::new(config)?));
        Ok(manager)
    }

    /// Register `plugin`. A plugin with the same name is replaced in place,
    /// keeping its position in the listing.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        match self.plugins.iter_mut().find(|p| p.name() == plugin.name()) {
            Some(slot) => {
                debug!(name = plugin.name(), "replacing registered plugin");
                *slot = plugin;
            }
            None => {
                debug!(name = plugin.name(), "registering plugin");
                self.plugins.push(plugin);
            }
        }
    }

    /// Look up a plugin by name.
    pub fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// Names and descriptions of all registered plugins.
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| PluginInfo {
                name: p.name().to_string(),
                description: p.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
