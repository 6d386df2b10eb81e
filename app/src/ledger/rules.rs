//! Pure game rules: construction, unique names, transfers, completion and
//! cleanup eligibility. No I/O; the `Ledger` service wires these to the
//! store and the hub.

use chrono::{DateTime, TimeDelta, Utc};

use banker::{Game, GameOptions, GameState, Player};

/// Idle time after which a game still waiting for players may be removed.
pub const WAITING_FOR_PLAYERS_TTL: TimeDelta = TimeDelta::hours(4);
/// Idle time after which a game in progress may be removed.
pub const IN_PROGRESS_TTL: TimeDelta = TimeDelta::days(7);
/// Idle time after which a completed game may be removed.
pub const COMPLETED_TTL: TimeDelta = TimeDelta::days(1);

/// Short external id: first 8 hex chars of a v4 UUID, uppercased.
pub fn generate_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    uuid[..8].to_uppercase()
}

/// Build a fresh game in `WaitingForPlayers` with the creator as its only
/// human player and owner. With `money_on_free_parking` the pool entry is
/// inserted ahead of the creator.
pub fn new_game(
    game_id: String,
    creator_id: String,
    label: &str,
    creator_name: &str,
    options: GameOptions,
    now: DateTime<Utc>,
) -> Game {
    let mut players = Vec::with_capacity(2);
    if options.money_on_free_parking {
        players.push(Player::free_parking());
    }
    players.push(Player::new(creator_id.clone(), creator_name.trim()));

    Game {
        id: game_id,
        label: label.trim().to_string(),
        state: GameState::WaitingForPlayers,
        players,
        options,
        owner_player_id: Some(creator_id),
        created_at: now,
        updated_at: now,
    }
}

/// Resolve `proposed` against the names already in the game.
///
/// The trimmed name is used as-is when free; otherwise ` (n)` is appended
/// with the smallest `n` whose result is not taken.
pub fn unique_name<'a>(existing: impl IntoIterator<Item = &'a str>, proposed: &str) -> String {
    let existing: Vec<&str> = existing.into_iter().collect();
    let trimmed = proposed.trim();
    let mut candidate = trimmed.to_string();
    let mut n = 0u32;
    while existing.contains(&candidate.as_str()) {
        n += 1;
        candidate = format!("{trimmed} ({n})");
    }
    candidate
}

/// A player id not yet used in `game`.
pub fn fresh_player_id(game: &Game) -> String {
    loop {
        let id = generate_id();
        if !game.has_player(&id) {
            return id;
        }
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// What a payment did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Game was already completed; nothing changed.
    Ignored,
    /// Balances (possibly) moved and the state was re-evaluated.
    Applied { state: GameState },
}

/// A transfer would push a balance outside the `i64` range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payment of {amount} would overflow the balance of player '{player_id}'")]
pub struct BalanceOverflow {
    pub player_id: String,
    pub amount: i64,
}

/// Move `amount` from `source` to `target`. `None` or an id not in the game
/// stands for the bank on that side. Balances may go negative.
///
/// Both sides are computed before anything is written back, so an overflow
/// leaves `game` untouched.
pub fn apply_payment(
    game: &mut Game,
    source: Option<&str>,
    target: Option<&str>,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome, BalanceOverflow> {
    if game.is_completed() {
        return Ok(PaymentOutcome::Ignored);
    }

    let mut players = game.players.clone();
    let overflow = |player: &Player| BalanceOverflow {
        player_id: player.id.clone(),
        amount,
    };
    if let Some(player) = source.and_then(|id| players.iter_mut().find(|p| p.id == id)) {
        player.balance = player
            .balance
            .checked_sub(amount)
            .ok_or_else(|| overflow(player))?;
    }
    if let Some(player) = target.and_then(|id| players.iter_mut().find(|p| p.id == id)) {
        player.balance = player
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(player))?;
    }

    game.players = players;
    game.state = settled_state(game);
    game.updated_at = now;
    Ok(PaymentOutcome::Applied { state: game.state })
}

/// `Completed` when exactly one human player is still solvent, otherwise
/// `InProgress`. The free-parking pool never counts.
pub fn settled_state(game: &Game) -> GameState {
    let solvent = game.human_players().filter(|p| p.is_solvent()).count();
    if solvent == 1 {
        GameState::Completed
    } else {
        GameState::InProgress
    }
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

/// Per-state cutoffs computed once for a given `now`. Used both for
/// filtering loaded games and as the store's removal predicate, so both
/// paths agree exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupCutoffs {
    pub waiting_for_players: DateTime<Utc>,
    pub in_progress: DateTime<Utc>,
    pub completed: DateTime<Utc>,
}

impl CleanupCutoffs {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            waiting_for_players: now - WAITING_FOR_PLAYERS_TTL,
            in_progress: now - IN_PROGRESS_TTL,
            completed: now - COMPLETED_TTL,
        }
    }

    /// Last update strictly before the cutoff for the game's state.
    pub fn is_due(&self, game: &Game) -> bool {
        let cutoff = match game.state {
            GameState::WaitingForPlayers => self.waiting_for_players,
            GameState::InProgress => self.in_progress,
            GameState::Completed => self.completed,
        };
        game.updated_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use banker::{FREE_PARKING_ID, STARTING_BALANCE};

    use super::*;

    fn options(free_parking: bool) -> GameOptions {
        GameOptions {
            money_on_free_parking: free_parking,
            double_money_on_go: false,
        }
    }

    fn with_players(balances: &[i64]) -> Game {
        let mut game = new_game(
            "G".into(),
            "P0".into(),
            "Label",
            "P0",
            options(true),
            Utc::now(),
        );
        game.players.truncate(1);
        for (i, b) in balances.iter().enumerate() {
            let mut p = Player::new(format!("P{i}"), format!("P{i}"));
            p.balance = *b;
            game.players.push(p);
        }
        game
    }

    #[test]
    fn new_game_places_free_parking_first() {
        let now = Utc::now();
        let game = new_game(
            "G1".into(),
            "A".into(),
            "  Fam Night ",
            " Alice ",
            options(true),
            now,
        );
        assert_eq!(game.label, "Fam Night");
        assert_eq!(game.state, GameState::WaitingForPlayers);
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.players[0].id, FREE_PARKING_ID);
        assert_eq!(game.players[0].balance, 0);
        assert_eq!(game.players[1].name, "Alice");
        assert_eq!(game.players[1].balance, STARTING_BALANCE);
        assert_eq!(game.owner_player_id.as_deref(), Some("A"));
        assert_eq!(game.updated_at, now);

        let plain = new_game("G2".into(), "A".into(), "x", "Alice", options(false), now);
        assert!(plain.free_parking().is_none());
    }

    #[test]
    fn unique_name_counts_up_in_join_order() {
        let mut names: Vec<String> = Vec::new();
        for _ in 0..4 {
            let name = unique_name(names.iter().map(String::as_str), " Alice ");
            names.push(name);
        }
        assert_eq!(names, ["Alice", "Alice (1)", "Alice (2)", "Alice (3)"]);
    }

    #[test]
    fn unique_name_scans_instead_of_counting() {
        let existing = ["Alice", "Alice (1)"];
        assert_eq!(unique_name(existing, "Alice"), "Alice (2)");
        // A literal "(1)" name already present does not collide
        assert_eq!(unique_name(["Alice (1)"], "Alice"), "Alice");
        assert_eq!(unique_name(["Alice (1)"], "Alice (1)"), "Alice (1) (1)");
    }

    #[test]
    fn generated_ids_are_short_upper_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn transfer_between_players_conserves_total() {
        let mut game = with_players(&[1500, 1500]);
        let total = game.total_balance();
        let outcome = apply_payment(&mut game, Some("P0"), Some("P1"), 200, Utc::now()).unwrap();

        assert_eq!(outcome, PaymentOutcome::Applied { state: GameState::InProgress });
        assert_eq!(game.player("P0").unwrap().balance, 1300);
        assert_eq!(game.player("P1").unwrap().balance, 1700);
        assert_eq!(game.total_balance(), total);
    }

    #[test]
    fn bank_sides_create_and_destroy_money() {
        let mut game = with_players(&[1500, 1500]);
        let total = game.total_balance();

        apply_payment(&mut game, None, Some(FREE_PARKING_ID), 100, Utc::now()).unwrap();
        assert_eq!(game.free_parking().unwrap().balance, 100);
        assert_eq!(game.total_balance(), total + 100);

        apply_payment(&mut game, Some("P1"), None, 300, Utc::now()).unwrap();
        assert_eq!(game.total_balance(), total - 200);

        // Unknown ids behave like the bank
        apply_payment(&mut game, Some("ghost"), Some("P0"), 50, Utc::now()).unwrap();
        assert_eq!(game.player("P0").unwrap().balance, 1550);
    }

    #[test]
    fn balances_may_go_negative() {
        let mut game = with_players(&[100, 1500, 1500]);
        apply_payment(&mut game, Some("P0"), Some("P1"), 250, Utc::now()).unwrap();
        assert_eq!(game.player("P0").unwrap().balance, -150);
        assert_eq!(game.state, GameState::InProgress);
    }

    #[test]
    fn completes_when_one_solvent_player_remains() {
        let mut game = with_players(&[100, 0]);
        // Paying the pool does not make it count as solvent
        let outcome =
            apply_payment(&mut game, Some("P0"), Some(FREE_PARKING_ID), 50, Utc::now()).unwrap();
        assert_eq!(outcome, PaymentOutcome::Applied { state: GameState::Completed });

        let mut game = with_players(&[100, 0]);
        apply_payment(&mut game, Some("P0"), Some("P1"), 50, Utc::now()).unwrap();
        assert_eq!(game.state, GameState::InProgress);
    }

    #[test]
    fn completed_games_ignore_payments() {
        let mut game = with_players(&[100, 0]);
        game.state = GameState::Completed;
        let before = game.clone();

        let outcome = apply_payment(&mut game, None, Some("P1"), 5000, Utc::now()).unwrap();
        assert_eq!(outcome, PaymentOutcome::Ignored);
        assert_eq!(game, before);
    }

    #[test]
    fn first_payment_starts_the_game() {
        let mut game = with_players(&[1500, 1500]);
        assert_eq!(game.state, GameState::WaitingForPlayers);
        apply_payment(&mut game, None, Some(FREE_PARKING_ID), 1, Utc::now()).unwrap();
        assert_eq!(game.state, GameState::InProgress);
    }

    #[test]
    fn overflowing_payment_leaves_game_untouched() {
        let mut game = with_players(&[1500, i64::MAX - 10]);
        let before = game.clone();

        let err =
            apply_payment(&mut game, Some("P0"), Some("P1"), 100, Utc::now()).unwrap_err();
        assert_eq!(err.player_id, "P1");
        assert_eq!(game, before);

        let mut game = with_players(&[i64::MIN + 10, 1500]);
        let before = game.clone();
        let err = apply_payment(&mut game, Some("P0"), None, 100, Utc::now()).unwrap_err();
        assert_eq!(err.player_id, "P0");
        assert_eq!(game, before);
    }

    fn is_due_for_cleanup(game: &Game, now: DateTime<Utc>) -> bool {
        CleanupCutoffs::at(now).is_due(game)
    }

    fn aged(state: GameState, age: TimeDelta, now: DateTime<Utc>) -> Game {
        let mut game = with_players(&[1]);
        game.state = state;
        game.updated_at = now - age;
        game
    }

    #[test]
    fn cleanup_cutoffs_are_strict() {
        let now = Utc::now();
        let second = TimeDelta::seconds(1);
        for (state, ttl) in [
            (GameState::WaitingForPlayers, WAITING_FOR_PLAYERS_TTL),
            (GameState::InProgress, IN_PROGRESS_TTL),
            (GameState::Completed, COMPLETED_TTL),
        ] {
            assert!(is_due_for_cleanup(&aged(state, ttl + second, now), now), "{state} past ttl");
            assert!(!is_due_for_cleanup(&aged(state, ttl - second, now), now), "{state} within ttl");
            assert!(!is_due_for_cleanup(&aged(state, ttl, now), now), "{state} exactly at ttl");
        }
    }

    #[test]
    fn cutoffs_depend_on_state() {
        let now = Utc::now();
        let five_hours = TimeDelta::hours(5);
        assert!(is_due_for_cleanup(&aged(GameState::WaitingForPlayers, five_hours, now), now));
        assert!(!is_due_for_cleanup(&aged(GameState::InProgress, five_hours, now), now));
        assert!(!is_due_for_cleanup(&aged(GameState::Completed, five_hours, now), now));
    }
}
