use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    routes::{ApiQuery, GameIdQuery},
    services::{game_service, websocket_service},
    state::{SharedState, game::GameId},
};

#[utoipa::path(
    get,
    path = "/api/games/{game_id}/ws",
    tag = "realtime",
    params(("game_id" = String, Path, description = "Game identifier, case-insensitive")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Malformed game id")
    )
)]
/// Upgrade the HTTP connection into a WebSocket observing one game.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = game_service::parse_game_id(Some(&game_id))?;
    upgrade(state, id, ws)
}

#[utoipa::path(
    get,
    path = "/api/websocket",
    tag = "realtime",
    params(GameIdQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Game ID required")
    )
)]
/// Same as [`ws_handler`] with the game taken from `?gameId=`.
pub async fn ws_handler_by_query(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<GameIdQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = game_service::parse_game_id(query.game_id.as_deref())?;
    upgrade(state, id, ws)
}

/// The game id is checked before the upgrade so a malformed id is a plain 400.
fn upgrade(
    state: SharedState,
    id: GameId,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<impl IntoResponse, AppError> {
    let ws = ws.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, id, socket)))
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/games/{game_id}/ws", get(ws_handler))
        .route("/api/websocket", get(ws_handler_by_query))
}
