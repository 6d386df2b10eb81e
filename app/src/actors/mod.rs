//! Actor infrastructure: shared trait and actor resolution from config.

pub mod cleanup;
pub mod web;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::state::SystemState;
use crate::state::config::{BankerConfig, global_id};

// ---------------------------------------------------------------------------
// Actor trait
// ---------------------------------------------------------------------------

/// Common trait for self-managed actors. Each actor struct holds its own
/// config; `start()` clones what it needs and spawns a thread.
pub trait Actor: Send + Sync {
    /// Spawn the actor's run loop. The loop exits once `shutdown` is set.
    fn start(&self, state: Arc<SystemState>, shutdown: Arc<AtomicBool>);

    /// Request the actor to stop. Default: no-op (actors poll the shutdown
    /// flag).
    fn stop(&self) {}
}

// ---------------------------------------------------------------------------
// Actor resolution
// ---------------------------------------------------------------------------

/// A concrete actor ready to be started, resolved from config.
pub struct ResolvedActor {
    pub id: String,
    pub name: String,
    pub actor: Box<dyn Actor>,
}

/// Build a flat list of all actors from the persisted config: one per
/// configured web server plus the cleanup job when enabled. Invalid bind
/// addresses are logged and skipped.
pub fn resolve_actors(config: &BankerConfig) -> Vec<ResolvedActor> {
    let mut actors = Vec::new();

    let mut webservers: Vec<_> = config.webserver.iter().collect();
    webservers.sort_by(|a, b| a.0.cmp(b.0));
    for (index, ws) in webservers {
        let id = global_id("webserver", index);
        match ws.bind.parse::<SocketAddr>() {
            Ok(addr) => {
                actors.push(ResolvedActor {
                    id,
                    name: ws.name.clone(),
                    actor: Box::new(web::WebActor::new(addr)),
                });
            }
            Err(e) => {
                tracing::warn!("webserver '{id}': invalid bind address '{}': {e}", ws.bind);
            }
        }
    }

    if config.cleanup.enabled {
        actors.push(ResolvedActor {
            id: "cleanup".into(),
            name: "Game Cleanup".into(),
            actor: Box::new(cleanup::CleanupActor {
                interval: Duration::from_secs(config.cleanup.interval_secs.max(1)),
            }),
        });
    }

    actors
}

/// Start a resolved actor with a fresh shutdown flag and register it.
pub fn start_actor(id: String, actor: Box<dyn Actor>, state: &Arc<SystemState>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    actor.start(Arc::clone(state), Arc::clone(&shutdown));
    state.register_actor(id, actor, shutdown);
}
