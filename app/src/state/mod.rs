pub mod config;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::actors::Actor;
use crate::bus::ChangeHub;
use crate::ledger::Ledger;
use config::SystemConfig;
use store::{FileGameStore, GameStore, MemoryGameStore, StoreError};

/// Root entry point for all managed application state.
///
/// Passed as `Arc<SystemState>` to all actors and the web layer.
pub struct SystemState {
    pub system: SystemConfig,
    pub ledger: Ledger,
    actors: RwLock<HashMap<String, (Box<dyn Actor>, Arc<AtomicBool>)>>,
}

impl SystemState {
    /// Load config from `config_path` and open the configured game store.
    /// `force_memory` ignores any configured store path.
    pub fn new(config_path: PathBuf, force_memory: bool) -> Result<Self, StoreError> {
        let system = SystemConfig::new(config_path);
        let store_path = system.snapshot().store.path.filter(|_| !force_memory);
        let store: Arc<dyn GameStore> = match store_path {
            Some(path) => {
                let store = FileGameStore::open(path)?;
                tracing::info!("game store: {}", store.dir().display());
                Arc::new(store)
            }
            None => {
                tracing::info!("game store: in-memory (games are lost on exit)");
                Arc::new(MemoryGameStore::new())
            }
        };
        Ok(Self::with_store(system, store))
    }

    pub fn with_store(system: SystemConfig, store: Arc<dyn GameStore>) -> Self {
        Self {
            system,
            ledger: Ledger::new(store, ChangeHub::new()),
            actors: RwLock::new(HashMap::new()),
        }
    }

    // ----- Actor registry -----

    /// Register an actor in the registry with its shutdown flag.
    pub fn register_actor(&self, id: String, actor: Box<dyn Actor>, shutdown: Arc<AtomicBool>) {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (actor, shutdown));
    }

    /// Get the list of all registered actor IDs.
    pub fn actor_ids(&self) -> Vec<String> {
        self.actors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Stop an actor by setting its shutdown flag and calling `stop()`.
    pub fn stop_actor(&self, id: &str) {
        let guard = self.actors.read().unwrap_or_else(|e| e.into_inner());
        if let Some((actor, shutdown)) = guard.get(id) {
            shutdown.store(true, Ordering::Relaxed);
            actor.stop();
        }
    }

    /// Remove an actor from the registry, returning it.
    pub fn remove_actor(&self, id: &str) -> Option<Box<dyn Actor>> {
        self.actors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .map(|(a, _)| a)
    }
}
