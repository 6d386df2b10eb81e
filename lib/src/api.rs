//! REST API request/response types and their edge validation rules.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::FREE_PARKING_ID;

/// Upper bound on labels, names and ids accepted at the edge.
pub const MAX_FIELD_LEN: usize = 100;

/// Largest single payment accepted at the edge.
pub const MAX_PAYMENT_AMOUNT: i64 = i32::MAX as i64;

/// POST /api/banker/create request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCreateRequest {
    pub label: String,
    pub player_name: String,
    #[serde(default)]
    pub money_on_free_parking: bool,
    #[serde(default)]
    pub double_money_on_go: bool,
}

/// POST /api/banker/create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCreateResponse {
    pub game_id: String,
    pub player_id: String,
}

/// POST /api/banker/join request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameJoinRequest {
    pub game_id: String,
    pub player_name: String,
}

/// POST /api/banker/join response. Join failures are reported through the
/// flags, not through the status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameJoinResponse {
    pub exists: bool,
    pub already_in_progress: bool,
    #[serde(default)]
    pub player_id: Option<String>,
}

/// POST /api/banker/payment request body. An absent side is the bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentExecuteRequest {
    pub game_id: String,
    #[serde(default)]
    pub source_player_id: Option<String>,
    #[serde(default)]
    pub target_player_id: Option<String>,
    pub amount: i64,
}

/// POST /api/banker/still-active request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamesStillActiveRequest {
    #[serde(default)]
    pub game_ids: Vec<String>,
}

/// POST /api/banker/still-active response: game id → not completed.
/// Serializes as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GamesStillActiveResponse(pub HashMap<String, bool>);

/// GET /api/banker/{gameId}/stream query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStreamQuery {
    #[serde(default)]
    pub player_id: String,
}

/// GET /api/monitoring/dashboard/quick response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuickResponse {
    pub banker: BankerStats,
}

/// GET /api/monitoring/health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub live_streams: u64,
    pub requests: u64,
}

/// Aggregate over the stored games. When `was_capped` is set, every count
/// except `count_games` covers only the first `cap` games fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankerStats {
    pub count_games: u64,
    pub was_capped: bool,
    pub count_games_waiting_for_players: u64,
    pub count_games_in_progress: u64,
    pub count_games_completed: u64,
    pub count_games_due_for_cleanup: u64,
    pub count_total_players: u64,
    pub avg_players_per_game: f64,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Field-level validation failures, serialized as the 400 response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be empty");
        } else if value.chars().count() > MAX_FIELD_LEN {
            self.add(field, format!("must be at most {MAX_FIELD_LEN} characters"));
        }
    }

    fn optional(&mut self, field: &str, value: Option<&str>) {
        if value.is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
            self.add(field, format!("must be at most {MAX_FIELD_LEN} characters"));
        }
    }
}

impl GameCreateRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("label", &self.label);
        errors.required("playerName", &self.player_name);
        errors.into_result()
    }
}

impl GameJoinRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("gameId", &self.game_id);
        errors.required("playerName", &self.player_name);
        errors.into_result()
    }
}

impl PaymentExecuteRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.required("gameId", &self.game_id);
        errors.optional("sourcePlayerId", self.source_player_id.as_deref());
        errors.optional("targetPlayerId", self.target_player_id.as_deref());
        if self.amount <= 0 {
            errors.add("amount", "must be greater than 0");
        } else if self.amount > MAX_PAYMENT_AMOUNT {
            errors.add("amount", format!("must be at most {MAX_PAYMENT_AMOUNT}"));
        }
        errors.into_result()
    }
}

/// Validate the path and query of a stream connect.
pub fn validate_stream(game_id: &str, query: &GameStreamQuery) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.required("gameId", game_id);
    errors.required("playerId", &query.player_id);
    if query.player_id == FREE_PARKING_ID {
        errors.add("playerId", "must not be the free-parking pool");
    }
    errors.into_result()
}
