//! Adapter registry
//!
//! Name-keyed collection of live adapters. The registry orchestrates adapters
//! it is handed; it never creates or tears down engine handles itself.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tether_core::{DatabaseAdapter, Result, TetherError};

use crate::health::HealthOrchestrator;

/// Registry of live adapters, unique by name
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<BTreeMap<String, Arc<dyn DatabaseAdapter>>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.list())
            .finish()
    }
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A second adapter with the same name is rejected,
    /// never silently replaced.
    pub fn register(&self, adapter: Arc<dyn DatabaseAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        let mut adapters = self.adapters.write();
        if adapters.contains_key(&name) {
            tracing::error!(adapter = %name, "duplicate adapter registration");
            return Err(TetherError::RegistryConflict(name));
        }
        tracing::info!(adapter = %name, engine = %adapter.engine(), "registering adapter");
        adapters.insert(name, adapter);
        Ok(())
    }

    /// Remove an adapter without disconnecting it
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn DatabaseAdapter>> {
        self.adapters.write().remove(name)
    }

    /// Get an adapter by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseAdapter>> {
        let adapter = self.adapters.read().get(name).cloned();
        if adapter.is_none() {
            tracing::warn!(adapter = %name, "adapter not found in registry");
        }
        adapter
    }

    /// List all registered adapter names, sorted
    pub fn list(&self) -> Vec<String> {
        self.adapters.read().keys().cloned().collect()
    }

    /// Check if an adapter is registered
    pub fn has(&self, name: &str) -> bool {
        self.adapters.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    pub fn adapters(&self) -> Vec<Arc<dyn DatabaseAdapter>> {
        self.adapters.read().values().cloned().collect()
    }

    /// Orchestrator over every adapter registered right now
    pub fn health_orchestrator(&self) -> HealthOrchestrator {
        HealthOrchestrator::new(self.adapters())
    }

    /// Disconnect every adapter concurrently
    pub async fn disconnect_all(&self) {
        let adapters = self.adapters();
        futures::future::join_all(adapters.iter().map(|a| a.disconnect())).await;
    }
}
