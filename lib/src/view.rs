//! Player-scoped game view: what one connected player sees on the live
//! stream.

use serde::{Deserialize, Serialize};

use crate::{FREE_PARKING_ID, Game, GameOptions, GameState};

/// One balance holder, annotated relative to the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub is_owner: bool,
    pub is_bankrupt: bool,
    pub is_winner: bool,
}

/// Stream payload for a single viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: String,
    pub label: String,
    pub state: GameState,
    pub players: Vec<PlayerView>,
    /// The viewer's own entry.
    pub player: PlayerView,
    #[serde(default)]
    pub free_parking: Option<PlayerView>,
    pub options: GameOptions,
}

impl GameView {
    /// Project `game` for the viewer `player_id`. Returns `None` when the
    /// viewer is not a player of the game.
    pub fn for_player(game: &Game, player_id: &str) -> Option<Self> {
        let completed = game.is_completed();
        let max_balance = game.max_balance();
        let players: Vec<PlayerView> = game
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id.clone(),
                name: p.name.clone(),
                balance: p.balance,
                is_owner: game.owner_player_id.as_deref() == Some(p.id.as_str()),
                is_bankrupt: p.balance <= 0,
                is_winner: completed && Some(p.balance) == max_balance,
            })
            .collect();

        let player = players.iter().find(|p| p.id == player_id)?.clone();
        let free_parking = players.iter().find(|p| p.id == FREE_PARKING_ID).cloned();

        Some(Self {
            id: game.id.clone(),
            label: game.label.clone(),
            state: game.state,
            players,
            player,
            free_parking,
            options: game.options,
        })
    }
}
