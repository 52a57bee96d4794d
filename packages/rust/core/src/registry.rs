//! Name-keyed registry of source readers and renderers.
//!
//! The registry is populated once at startup (see
//! [`AdapterRegistry::with_builtins`]) and read concurrently afterwards by the
//! pipeline and the protocol server. Re-registering a name replaces the
//! previous entry, which is how tests swap in doubles.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use favs_shared::{AppConfig, Renderer, SourceReader};

/// Holds registered sources and renderers behind reader/writer locks.
#[derive(Default)]
pub struct AdapterRegistry {
    sources: RwLock<HashMap<String, Arc<dyn SourceReader>>>,
    renderers: RwLock<HashMap<String, Arc<dyn Renderer>>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in source and renderer.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for source in favs_sources::builtin_sources() {
            registry.register_source(source);
        }
        for renderer in favs_renderers::builtin_renderers() {
            registry.register_renderer(renderer);
        }
        registry
    }

    /// Apply each source's config section once, so that sources located
    /// only through a custom path report themselves available.
    pub fn configure_sources(&self, config: &AppConfig) {
        for (name, source) in read(&self.sources).iter() {
            let settings = config.source(name);
            if let Err(e) = source.configure(settings.to_options(settings.profile.clone())) {
                warn!(source = %name, error = %e, "configuration rejected");
            }
        }
    }

    /// Bind a source under its own name. The last registration wins.
    pub fn register_source(&self, reader: Arc<dyn SourceReader>) {
        let name = reader.name().to_string();
        debug!(%name, "registering source");
        write(&self.sources).insert(name, reader);
    }

    /// Bind a renderer under its own name. The last registration wins.
    pub fn register_renderer(&self, renderer: Arc<dyn Renderer>) {
        let name = renderer.name().to_string();
        debug!(%name, "registering renderer");
        write(&self.renderers).insert(name, renderer);
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<Arc<dyn SourceReader>> {
        read(&self.sources).get(name).cloned()
    }

    /// Look up a renderer by name.
    pub fn renderer(&self, name: &str) -> Option<Arc<dyn Renderer>> {
        read(&self.renderers).get(name).cloned()
    }

    /// All registered source names, sorted.
    pub fn source_names(&self) -> Vec<String> {
        sorted_keys(&read(&self.sources))
    }

    /// All registered renderer names, sorted.
    pub fn renderer_names(&self) -> Vec<String> {
        sorted_keys(&read(&self.renderers))
    }

    /// Sources that currently report themselves available, in name order.
    pub fn available_sources(&self) -> Vec<Arc<dyn SourceReader>> {
        let sources = read(&self.sources);
        sorted_keys(&sources)
            .iter()
            .filter_map(|name| sources.get(name))
            .filter(|source| source.available())
            .cloned()
            .collect()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

// A poisoned lock only means a registering thread panicked; the map itself is
// still consistent because every write is a single insert.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
