//! Live sync: per-player stream of game views.
//!
//! Connecting subscribes to the hub *before* loading the game, so a change
//! that lands between the load and the first wait is still delivered. That
//! same change may already be part of the loaded game; a published game
//! equal to the last one emitted is skipped, so the viewer never sees the
//! same state twice in a row.
//!
//! The first item is the current view; each later item is the view of a
//! published change. The stream ends when the hub closes, and dropping it
//! releases the subscription.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use super::{Ledger, LedgerError};
use crate::bus::Subscription;
use banker::{Game, GameView};

/// Views for one connected player, in publish order.
pub type GameViewStream = BoxStream<'static, GameView>;

struct Cursor {
    pending: Option<GameView>,
    last: Arc<Game>,
    subscription: Subscription,
    player_id: String,
}

impl Ledger {
    /// Open the live stream of `game_id` as seen by `player_id`.
    ///
    /// Fails with `NotFound` when the game does not exist or the player is
    /// not part of it; nothing is emitted and nothing stays subscribed.
    pub fn watch(&self, game_id: &str, player_id: &str) -> Result<GameViewStream, LedgerError> {
        let subscription = self.hub().subscribe(game_id);
        let game = self.find_game(game_id)?.ok_or(LedgerError::NotFound)?;
        let initial = GameView::for_player(&game, player_id).ok_or(LedgerError::NotFound)?;

        let cursor = Cursor {
            pending: Some(initial),
            last: Arc::new(game),
            subscription,
            player_id: player_id.to_string(),
        };
        Ok(stream::unfold(cursor, |mut cursor| async move {
            if let Some(view) = cursor.pending.take() {
                return Some((view, cursor));
            }
            loop {
                let game = cursor.subscription.recv().await.ok()?;
                if *game == *cursor.last {
                    continue;
                }
                let view = GameView::for_player(&game, &cursor.player_id)?;
                cursor.last = game;
                return Some((view, cursor));
            }
        })
        .boxed())
    }
}
