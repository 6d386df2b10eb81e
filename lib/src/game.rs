//! Game document types: one record per game, players embedded.
//!
//! The store persists `Game` as a single document, so every mutation
//! (join, payment) rewrites the whole record including its player list.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved player id of the shared free-parking pool.
pub const FREE_PARKING_ID: &str = "free-parking";

/// Display name of the free-parking pool.
pub const FREE_PARKING_NAME: &str = "Free Parking";

/// Balance every human player starts with.
pub const STARTING_BALANCE: i64 = 1500;

/// Lifecycle of a game. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameState {
    WaitingForPlayers,
    InProgress,
    Completed,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "waiting_for_players"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// House rules chosen at creation. Immutable afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOptions {
    pub money_on_free_parking: bool,
    pub double_money_on_go: bool,
}

/// A balance holder within a game. The free-parking pool is a `Player`
/// with the reserved id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub balance: i64,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance: STARTING_BALANCE,
        }
    }

    /// The empty free-parking pool.
    pub fn free_parking() -> Self {
        Self {
            id: FREE_PARKING_ID.into(),
            name: FREE_PARKING_NAME.into(),
            balance: 0,
        }
    }

    pub fn is_free_parking(&self) -> bool {
        self.id == FREE_PARKING_ID
    }

    /// Strictly positive balance.
    pub fn is_solvent(&self) -> bool {
        self.balance > 0
    }
}

/// One playthrough session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub label: String,
    pub state: GameState,
    /// Join order. The free-parking pool, when enabled, comes first.
    pub players: Vec<Player>,
    pub options: GameOptions,
    #[serde(default)]
    pub owner_player_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    pub fn free_parking(&self) -> Option<&Player> {
        self.player(FREE_PARKING_ID)
    }

    /// Players other than the free-parking pool.
    pub fn human_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_free_parking())
    }

    pub fn is_completed(&self) -> bool {
        self.state == GameState::Completed
    }

    /// Highest balance across all entries, free-parking included.
    pub fn max_balance(&self) -> Option<i64> {
        self.players.iter().map(|p| p.balance).max()
    }

    /// Sum of every balance, free-parking included.
    pub fn total_balance(&self) -> i64 {
        self.players.iter().map(|p| p.balance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Game {
        let now = Utc::now();
        Game {
            id: "G1".into(),
            label: "Fam Night".into(),
            state: GameState::InProgress,
            players: vec![
                Player::free_parking(),
                Player::new("A", "Alice"),
                Player::new("B", "Bob"),
            ],
            options: GameOptions {
                money_on_free_parking: true,
                double_money_on_go: false,
            },
            owner_player_id: Some("A".into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn human_players_skip_free_parking() {
        let game = sample();
        let names: Vec<_> = game.human_players().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
        assert_eq!(game.free_parking().map(|p| p.balance), Some(0));
    }

    #[test]
    fn state_serializes_camel_case() {
        let json = serde_json::to_string(&GameState::WaitingForPlayers).unwrap();
        assert_eq!(json, "\"waitingForPlayers\"");
        let game = serde_json::to_value(sample()).unwrap();
        assert_eq!(game["ownerPlayerId"], "A");
        assert_eq!(game["options"]["moneyOnFreeParking"], true);
    }

    #[test]
    fn totals() {
        let game = sample();
        assert_eq!(game.total_balance(), 3000);
        assert_eq!(game.max_balance(), Some(1500));
    }
}
