//! SSE live stream: one long-lived connection per viewing player.
//!
//! Every item is a `monopoly-banker-game-data` event whose data is the
//! player-scoped view.
//! The connection closes when the client goes away or the server shuts the
//! hub down; both paths drop the hub subscription.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};

use super::WebState;
use super::routes::ApiError;
use banker::{GameStreamQuery, validate_stream};

/// SSE event name carried by every view.
pub const GAME_DATA_EVENT: &str = "monopoly-banker-game-data";

/// Tracks one open stream for telemetry and logs its end.
struct Connection {
    state: Arc<WebState>,
    game_id: String,
    player_id: String,
}

impl Connection {
    fn open(state: Arc<WebState>, game_id: String, player_id: String) -> Self {
        let open = state.stream_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("stream: player '{player_id}' connected to game '{game_id}' ({open} open)");
        Self {
            state,
            game_id,
            player_id,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let open = self.state.stream_count.fetch_sub(1, Ordering::Relaxed) - 1;
        tracing::debug!(
            "stream: player '{}' left game '{}' ({open} open)",
            self.player_id,
            self.game_id
        );
    }
}

/// GET /api/banker/{game_id}/stream?playerId=
pub async fn get_stream(
    State(state): State<Arc<WebState>>,
    Path(game_id): Path<String>,
    Query(query): Query<GameStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    validate_stream(&game_id, &query)?;
    let views = state.root.ledger.watch(&game_id, &query.player_id)?;

    let connection = Connection::open(Arc::clone(&state), game_id, query.player_id);
    let events = views.map(move |view| {
        let _open = &connection;
        Event::default().event(GAME_DATA_EVENT).json_data(&view)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
