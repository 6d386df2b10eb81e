//! Game ledger: lifecycle and payment operations over the game store.
//!
//! Every operation re-reads the game, mutates it with the pure rules in
//! `rules`, saves the whole document, then publishes the updated game on the
//! hub. The ledger methods are synchronous, so once a save succeeds the
//! matching publish always runs, even if the HTTP caller has gone away.
//!
//! Concurrent payments on the same game race at the read-modify-write level
//! and the last save wins. There is no per-game lock.

mod live;
pub mod rules;

pub use rules::PaymentOutcome;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::ChangeHub;
use crate::state::store::{GameStore, StoreError};
use banker::{BankerStats, Game, GameOptions, GameState, Player};

/// Upper bound on games loaded into memory for statistics.
pub const STATS_CAP: usize = 1000;

/// Attempts at finding an unused game id before giving up.
const CREATE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("game or player not found")]
    NotFound,
    #[error(transparent)]
    Overflow(#[from] rules::BalanceOverflow),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a join attempt. Only store failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResult {
    NotFound,
    AlreadyInProgress,
    Joined { player_id: String },
}

/// Ids handed back to the creator of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedGame {
    pub game_id: String,
    pub player_id: String,
}

pub struct Ledger {
    store: Arc<dyn GameStore>,
    hub: Arc<ChangeHub>,
}

impl Ledger {
    pub fn new(store: Arc<dyn GameStore>, hub: Arc<ChangeHub>) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &Arc<ChangeHub> {
        &self.hub
    }

    pub fn find_game(&self, game_id: &str) -> Result<Option<Game>, LedgerError> {
        Ok(self.store.find(game_id)?)
    }

    /// Create a game with the creator as its first player and owner.
    pub fn create_game(
        &self,
        label: &str,
        creator_name: &str,
        options: GameOptions,
    ) -> Result<CreatedGame, LedgerError> {
        let player_id = rules::generate_id();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let game = rules::new_game(
                rules::generate_id(),
                player_id.clone(),
                label,
                creator_name,
                options,
                Utc::now(),
            );
            match self.store.insert(&game) {
                Ok(()) => {
                    tracing::info!(
                        "game '{}' ({}) created by player '{}'",
                        game.id,
                        game.label,
                        player_id
                    );
                    return Ok(CreatedGame {
                        game_id: game.id,
                        player_id,
                    });
                }
                Err(StoreError::Duplicate(id)) if attempt < CREATE_ATTEMPTS => {
                    tracing::debug!("game id '{id}' already taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Add a player to a game that is still waiting for players.
    pub fn join_game(&self, game_id: &str, proposed_name: &str) -> Result<JoinResult, LedgerError> {
        let Some(mut game) = self.store.find(game_id)? else {
            return Ok(JoinResult::NotFound);
        };
        if game.state != GameState::WaitingForPlayers {
            return Ok(JoinResult::AlreadyInProgress);
        }

        let name = rules::unique_name(game.players.iter().map(|p| p.name.as_str()), proposed_name);
        let player_id = rules::fresh_player_id(&game);
        game.players.push(Player::new(player_id.clone(), name));
        if game.owner_player_id.is_none() {
            game.owner_player_id = Some(player_id.clone());
        }
        game.updated_at = Utc::now();

        self.store.save(&game)?;
        let reached = self.hub.publish(&game);
        tracing::info!(
            "player '{}' joined game '{}' ({} live viewers)",
            player_id,
            game.id,
            reached
        );
        Ok(JoinResult::Joined { player_id })
    }

    /// Transfer `amount` between two balance holders. `None` is the bank.
    ///
    /// Payments against a completed game succeed without effect. A payment
    /// that would overflow a balance is rejected and nothing is saved.
    pub fn execute_payment(
        &self,
        game_id: &str,
        source: Option<&str>,
        target: Option<&str>,
        amount: i64,
    ) -> Result<PaymentOutcome, LedgerError> {
        let mut game = self.store.find(game_id)?.ok_or(LedgerError::NotFound)?;

        let outcome = rules::apply_payment(&mut game, source, target, amount, Utc::now())?;
        let PaymentOutcome::Applied { state } = outcome else {
            tracing::debug!("payment on completed game '{game_id}' ignored");
            return Ok(outcome);
        };

        self.store.save(&game)?;
        self.hub.publish(&game);
        tracing::debug!(
            "payment of {amount} in game '{game_id}': {} -> {}",
            source.unwrap_or("bank"),
            target.unwrap_or("bank")
        );
        if state == GameState::Completed {
            tracing::info!("game '{game_id}' completed");
        }
        Ok(outcome)
    }

    /// Map each requested id to whether the game exists and is not completed.
    pub fn games_still_active(&self, game_ids: &[String]) -> Result<HashMap<String, bool>, LedgerError> {
        if game_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let active: Vec<String> = self
            .store
            .find_many(game_ids)?
            .into_iter()
            .filter(|g| !g.is_completed())
            .map(|g| g.id)
            .collect();
        Ok(game_ids
            .iter()
            .map(|id| (id.clone(), active.contains(id)))
            .collect())
    }

    /// Remove every game that is due for cleanup at `now`.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        let cutoffs = rules::CleanupCutoffs::at(now);
        Ok(self.store.remove_where(&|game| cutoffs.is_due(game))?)
    }

    /// Aggregate statistics over at most `STATS_CAP` games. `count_games`
    /// is the raw store count, so unreadable documents show up there but
    /// in none of the per-game counts.
    pub fn stats(&self, now: DateTime<Utc>) -> Result<BankerStats, LedgerError> {
        let count_games = self.store.count()?;
        let games = self.store.list(STATS_CAP)?;
        let cutoffs = rules::CleanupCutoffs::at(now);

        let count_state =
            |state: GameState| games.iter().filter(|g| g.state == state).count() as u64;
        let count_total_players: usize = games.iter().map(|g| g.players.len()).sum();

        Ok(BankerStats {
            count_games: count_games as u64,
            was_capped: count_games > STATS_CAP,
            count_games_waiting_for_players: count_state(GameState::WaitingForPlayers),
            count_games_in_progress: count_state(GameState::InProgress),
            count_games_completed: count_state(GameState::Completed),
            count_games_due_for_cleanup: games.iter().filter(|g| cutoffs.is_due(g)).count() as u64,
            count_total_players: count_total_players as u64,
            avg_players_per_game: count_total_players as f64 / count_games.max(1) as f64,
        })
    }
}
