//! Change notification hub: wraps one `tokio::sync::broadcast` channel per
//! game so callers never touch the broadcast types directly.
//!
//! Publishers hand over the full updated `Game`; every `Subscription` open
//! on that game id at publish time receives it exactly once. Nothing is
//! buffered for later subscribers. A channel exists only while at least one
//! subscription for its game is alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use banker::Game;

/// Per-game backlog before a slow subscriber starts lagging.
const CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// PollError
// ---------------------------------------------------------------------------

/// Error from `Subscription::recv()`: the hub has been closed.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError {
    Shutdown,
}

// ---------------------------------------------------------------------------
// ChangeHub
// ---------------------------------------------------------------------------

/// In-process fan-out of "game changed" events.
pub struct ChangeHub {
    channels: Mutex<HashMap<String, broadcast::Sender<Arc<Game>>>>,
    closed: AtomicBool,
}

impl ChangeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Register interest in `game_id`. Events published after this call
    /// returns are delivered to the subscription; dropping it unregisters.
    pub fn subscribe(self: &Arc<Self>, game_id: &str) -> Subscription {
        let inner = if self.is_closed() {
            None
        } else {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            let tx = channels
                .entry(game_id.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
            Some(tx.subscribe())
        };
        Subscription {
            game_id: game_id.to_string(),
            inner,
            hub: Arc::clone(self),
        }
    }

    /// Deliver `game` to every live subscription on its id. Returns the
    /// number of subscriptions reached. Never fails the publisher.
    pub fn publish(&self, game: &Game) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        match channels.get(&game.id) {
            Some(tx) => tx.send(Arc::new(game.clone())).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live subscriptions on `game_id`.
    pub fn subscriber_count(&self, game_id: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(game_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Number of games with at least one live subscription.
    pub fn game_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Close the hub. Every pending and future `recv()` returns
    /// `PollError::Shutdown`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Drop the channel for `game_id` once nobody listens on it.
    fn prune(&self, game_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if channels
            .get(game_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(game_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Live registration on one game's changes. Unregisters on drop, so every
/// exit path of the owner (error, cancellation, normal return) releases it.
pub struct Subscription {
    game_id: String,
    inner: Option<broadcast::Receiver<Arc<Game>>>,
    hub: Arc<ChangeHub>,
}

impl Subscription {
    /// Wait for the next change to this game.
    ///
    /// Cancel-safe: dropping the future loses no event that has not been
    /// returned yet.
    pub async fn recv(&mut self) -> Result<Arc<Game>, PollError> {
        let Some(rx) = self.inner.as_mut() else {
            return Err(PollError::Shutdown);
        };
        loop {
            match rx.recv().await {
                Ok(game) => return Ok(game),
                Err(broadcast::error::RecvError::Closed) => return Err(PollError::Shutdown),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Each event carries the full game; only the latest matters
                    tracing::warn!("hub: game '{}' subscriber lagged, skipped {n} events", self.game_id);
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            self.hub.prune(&self.game_id);
        }
    }
}
