//! REST endpoint handlers.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::WebState;
use crate::ledger::{JoinResult, LedgerError};
use banker::{
    DashboardQuickResponse, GameCreateRequest, GameCreateResponse, GameJoinRequest,
    GameJoinResponse, GameOptions, GamesStillActiveRequest, GamesStillActiveResponse,
    HealthResponse, PaymentExecuteRequest, ValidationErrors,
};

/// Header carrying a monitoring API key.
pub const API_KEY_HEADER: &str = "x-api-key";

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Invalid(ValidationErrors),
    NotFound,
    Unauthorized,
    Internal(LedgerError),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Invalid(errors)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound => ApiError::NotFound,
            LedgerError::Overflow(overflow) => {
                let mut errors = ValidationErrors::default();
                errors.add("amount", overflow.to_string());
                ApiError::Invalid(errors)
            }
            e => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Internal(e) => {
                tracing::warn!("request failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Banker API
// ---------------------------------------------------------------------------

/// POST /api/banker/create
pub async fn post_create(
    State(state): State<Arc<WebState>>,
    Json(body): Json<GameCreateRequest>,
) -> Result<Json<GameCreateResponse>, ApiError> {
    body.validate()?;
    let options = GameOptions {
        money_on_free_parking: body.money_on_free_parking,
        double_money_on_go: body.double_money_on_go,
    };
    let created = state
        .root
        .ledger
        .create_game(&body.label, &body.player_name, options)?;
    Ok(Json(GameCreateResponse {
        game_id: created.game_id,
        player_id: created.player_id,
    }))
}

/// POST /api/banker/join
pub async fn post_join(
    State(state): State<Arc<WebState>>,
    Json(body): Json<GameJoinRequest>,
) -> Result<Json<GameJoinResponse>, ApiError> {
    body.validate()?;
    let response = match state.root.ledger.join_game(&body.game_id, &body.player_name)? {
        JoinResult::NotFound => GameJoinResponse {
            exists: false,
            already_in_progress: false,
            player_id: None,
        },
        JoinResult::AlreadyInProgress => GameJoinResponse {
            exists: true,
            already_in_progress: true,
            player_id: None,
        },
        JoinResult::Joined { player_id } => GameJoinResponse {
            exists: true,
            already_in_progress: false,
            player_id: Some(player_id),
        },
    };
    Ok(Json(response))
}

/// POST /api/banker/payment: 204 once applied (or ignored on a completed
/// game), 404 for an unknown game.
pub async fn post_payment(
    State(state): State<Arc<WebState>>,
    Json(body): Json<PaymentExecuteRequest>,
) -> Result<StatusCode, ApiError> {
    body.validate()?;
    state.root.ledger.execute_payment(
        &body.game_id,
        body.source_player_id.as_deref(),
        body.target_player_id.as_deref(),
        body.amount,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/banker/still-active
pub async fn post_still_active(
    State(state): State<Arc<WebState>>,
    Json(body): Json<GamesStillActiveRequest>,
) -> Result<Json<GamesStillActiveResponse>, ApiError> {
    let active = state.root.ledger.games_still_active(&body.game_ids)?;
    Ok(Json(GamesStillActiveResponse(active)))
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

/// GET /api/monitoring/health
pub async fn get_health(State(state): State<Arc<WebState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        live_streams: state.stream_count.load(Ordering::Relaxed),
        requests: state.request_count.load(Ordering::Relaxed),
    })
}

/// GET /api/monitoring/dashboard/quick: requires a valid `X-API-KEY`.
pub async fn get_dashboard_quick(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardQuickResponse>, ApiError> {
    let now = Utc::now();
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let monitoring = state.root.system.snapshot().monitoring;
    let Some(found) = monitoring.find_key(key, now) else {
        tracing::debug!("dashboard: rejected API key");
        return Err(ApiError::Unauthorized);
    };
    tracing::debug!("dashboard: accessed with key '{}'", found.label);

    let banker = state.root.ledger.stats(now)?;
    Ok(Json(DashboardQuickResponse { banker }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::TimeDelta;
    use serde_json::{Value, json};

    use axum::response::IntoResponse;

    use super::super::testing::{TestServer, json_request, request};
    use super::{ApiError, LedgerError};
    use crate::ledger::rules::BalanceOverflow;
    use banker::{ApiKeySection, hash_api_key};

    async fn create(server: &TestServer, label: &str, name: &str, free_parking: bool) -> (String, String) {
        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/create",
                json!({ "label": label, "playerName": name, "moneyOnFreeParking": free_parking }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        (
            body["gameId"].as_str().unwrap().to_string(),
            body["playerId"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn create_join_pay_round_trip() {
        let server = TestServer::new(|_| {});
        let (game_id, alice) = create(&server, "Fam Night", "Alice", true).await;
        assert_eq!(game_id.len(), 8);

        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/join",
                json!({ "gameId": game_id, "playerName": "Alice" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let joined: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(joined["exists"], true);
        assert_eq!(joined["alreadyInProgress"], false);
        let bob = joined["playerId"].as_str().unwrap().to_string();

        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/payment",
                json!({ "gameId": game_id, "sourcePlayerId": bob, "targetPlayerId": "free-parking", "amount": 100 }),
            ))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let game = server.root.ledger.find_game(&game_id).unwrap().unwrap();
        assert_eq!(game.player(&alice).unwrap().balance, 1500);
        assert_eq!(game.player(&bob).unwrap().balance, 1400);
        assert_eq!(game.player(&bob).unwrap().name, "Alice (1)");
        assert_eq!(game.free_parking().unwrap().balance, 100);

        // Game is in progress now, so further joins are refused
        let (_, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/join",
                json!({ "gameId": game_id, "playerName": "Carol" }),
            ))
            .await;
        let refused: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(refused, json!({ "exists": true, "alreadyInProgress": true, "playerId": null }));
    }

    #[tokio::test]
    async fn join_unknown_game_reports_missing() {
        let server = TestServer::new(|_| {});
        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/join",
                json!({ "gameId": "NOPE", "playerName": "Bob" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["exists"], false);
        assert_eq!(body["alreadyInProgress"], false);
    }

    #[tokio::test]
    async fn invalid_requests_are_400_with_field_errors() {
        let server = TestServer::new(|_| {});
        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/create",
                json!({ "label": "  ", "playerName": "Alice" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["errors"]["label"].is_array());
        assert!(body["errors"].get("playerName").is_none());

        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/payment",
                json!({ "gameId": "ABCD1234", "amount": 0 }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["errors"]["amount"].is_array());
    }

    #[tokio::test]
    async fn huge_payment_amounts_are_400_not_a_crash() {
        let server = TestServer::new(|_| {});
        let (game_id, alice) = create(&server, "Rich", "Alice", false).await;

        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/payment",
                json!({ "gameId": game_id, "targetPlayerId": alice, "amount": i64::MAX }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["errors"]["amount"].is_array());

        let game = server.root.ledger.find_game(&game_id).unwrap().unwrap();
        assert_eq!(game.player(&alice).unwrap().balance, 1500);
    }

    #[tokio::test]
    async fn balance_overflow_maps_to_field_error() {
        let overflow = BalanceOverflow {
            player_id: "P".into(),
            amount: 5,
        };
        let response = ApiError::from(LedgerError::from(overflow)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["errors"]["amount"][0].as_str().unwrap().contains("overflow"));
    }

    #[tokio::test]
    async fn payment_on_unknown_game_is_404() {
        let server = TestServer::new(|_| {});
        let (status, _) = server
            .send(json_request(
                Method::POST,
                "/api/banker/payment",
                json!({ "gameId": "NOPE", "targetPlayerId": "X", "amount": 10 }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn still_active_is_a_flat_map() {
        let server = TestServer::new(|_| {});
        let (game_id, _) = create(&server, "Live", "Alice", false).await;

        let (status, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/still-active",
                json!({ "gameIds": [game_id, "GONE"] }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ game_id: true, "GONE": false }));

        let (_, body) = server
            .send(json_request(
                Method::POST,
                "/api/banker/still-active",
                json!({ "gameIds": [] }),
            ))
            .await;
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn health_needs_no_key() {
        let server = TestServer::new(|_| {});
        let (status, body) = server
            .send(request(Method::GET, "/api/monitoring/health", &[]))
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["liveStreams"], 0);
    }

    #[tokio::test]
    async fn dashboard_requires_a_live_key() {
        let server = TestServer::new(|c| {
            c.monitoring.api_keys = vec![
                ApiKeySection {
                    label: "ops".into(),
                    key_hash: hash_api_key("good"),
                    expires_at: None,
                },
                ApiKeySection {
                    label: "old".into(),
                    key_hash: hash_api_key("stale"),
                    expires_at: Some(chrono::Utc::now() - TimeDelta::days(1)),
                },
            ];
        });
        create(&server, "One", "Alice", true).await;
        create(&server, "Two", "Bob", false).await;

        let uri = "/api/monitoring/dashboard/quick";
        let (status, _) = server.send(request(Method::GET, uri, &[])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = server
            .send(request(Method::GET, uri, &[("X-API-KEY", "stale")]))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = server
            .send(request(Method::GET, uri, &[("X-API-KEY", "good")]))
            .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["banker"]["countGames"], 2);
        assert_eq!(body["banker"]["wasCapped"], false);
        assert_eq!(body["banker"]["countGamesWaitingForPlayers"], 2);
        assert_eq!(body["banker"]["countTotalPlayers"], 3);
        assert_eq!(body["banker"]["avgPlayersPerGame"], 1.5);
    }

    #[tokio::test]
    async fn create_is_rate_limited_per_client() {
        let server = TestServer::new(|c| {
            c.rate_limit.enabled = true;
            c.rate_limit.create_per_day = 1;
        });
        let body = json!({ "label": "Limited", "playerName": "Alice" });

        let mut first = json_request(Method::POST, "/api/banker/create", body.clone());
        first.headers_mut().insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
        assert_eq!(server.send(first).await.0, StatusCode::OK);

        let mut second = json_request(Method::POST, "/api/banker/create", body.clone());
        second.headers_mut().insert("x-forwarded-for", "10.0.0.1".parse().unwrap());
        assert_eq!(server.send(second).await.0, StatusCode::TOO_MANY_REQUESTS);

        let mut other = json_request(Method::POST, "/api/banker/create", body);
        other.headers_mut().insert("x-forwarded-for", "10.0.0.2".parse().unwrap());
        assert_eq!(server.send(other).await.0, StatusCode::OK);
    }
}
