use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::game::{
        AddPlayerRequest, CreateGameRequest, GameSummary, PlayerSummary, RoundSummary,
        SubmitScoresRequest,
    },
    error::AppError,
    routes::{ApiJson, ApiQuery, GameIdQuery},
    services::game_service,
    state::SharedState,
};

/// Game lifecycle routes, by path and by `?gameId=` query.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/games", post(create_game).get(get_game_by_query))
        .route("/api/games/{game_id}", get(get_game))
        .route("/api/games/{game_id}/players", post(add_player))
        .route("/api/games/{game_id}/scores", post(submit_scores))
        .route("/api/players", post(add_player_by_query))
        .route("/api/scores", post(submit_scores_by_query))
}

/// Create a new game, generating its identifier when none is supplied.
#[utoipa::path(
    post,
    path = "/api/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameSummary),
        (status = 400, description = "Malformed game id"),
        (status = 409, description = "Game already exists")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    ApiJson(payload): ApiJson<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameSummary>), AppError> {
    let summary = game_service::create_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Fetch the current state of a game.
#[utoipa::path(
    get,
    path = "/api/games/{game_id}",
    tag = "game",
    params(("game_id" = String, Path, description = "Game identifier, case-insensitive")),
    responses(
        (status = 200, description = "Game state", body = GameSummary),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameSummary>, AppError> {
    let id = game_service::parse_game_id(Some(&game_id))?;
    Ok(Json(game_service::get_game(&state, &id).await?))
}

#[utoipa::path(
    get,
    path = "/api/games",
    tag = "game",
    params(GameIdQuery),
    responses(
        (status = 200, description = "Game state", body = GameSummary),
        (status = 400, description = "Game ID required"),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game_by_query(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<GameIdQuery>,
) -> Result<Json<GameSummary>, AppError> {
    let id = game_service::parse_game_id(query.game_id.as_deref())?;
    Ok(Json(game_service::get_game(&state, &id).await?))
}

/// Join a game with a unique name and train color.
#[utoipa::path(
    post,
    path = "/api/games/{game_id}/players",
    tag = "game",
    params(("game_id" = String, Path, description = "Game identifier, case-insensitive")),
    request_body = AddPlayerRequest,
    responses(
        (status = 201, description = "Player added", body = PlayerSummary),
        (status = 400, description = "Invalid name or color"),
        (status = 404, description = "Game not found"),
        (status = 409, description = "Name or color taken, or game full")
    )
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
    ApiJson(payload): ApiJson<AddPlayerRequest>,
) -> Result<(StatusCode, Json<PlayerSummary>), AppError> {
    let id = game_service::parse_game_id(Some(&game_id))?;
    let player = game_service::add_player(&state, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

#[utoipa::path(
    post,
    path = "/api/players",
    tag = "game",
    params(GameIdQuery),
    request_body = AddPlayerRequest,
    responses(
        (status = 201, description = "Player added", body = PlayerSummary),
        (status = 400, description = "Game ID required"),
        (status = 404, description = "Game not found"),
        (status = 409, description = "Name or color taken, or game full")
    )
)]
pub async fn add_player_by_query(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<GameIdQuery>,
    ApiJson(payload): ApiJson<AddPlayerRequest>,
) -> Result<(StatusCode, Json<PlayerSummary>), AppError> {
    let id = game_service::parse_game_id(query.game_id.as_deref())?;
    let player = game_service::add_player(&state, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Record the next round. The round number is always assigned by the server.
#[utoipa::path(
    post,
    path = "/api/games/{game_id}/scores",
    tag = "game",
    params(("game_id" = String, Path, description = "Game identifier, case-insensitive")),
    request_body = SubmitScoresRequest,
    responses(
        (status = 201, description = "Round recorded", body = RoundSummary),
        (status = 404, description = "Game not found")
    )
)]
pub async fn submit_scores(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
    ApiJson(payload): ApiJson<SubmitScoresRequest>,
) -> Result<(StatusCode, Json<RoundSummary>), AppError> {
    let id = game_service::parse_game_id(Some(&game_id))?;
    let round = game_service::submit_scores(&state, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(round)))
}

#[utoipa::path(
    post,
    path = "/api/scores",
    tag = "game",
    params(GameIdQuery),
    request_body = SubmitScoresRequest,
    responses(
        (status = 201, description = "Round recorded", body = RoundSummary),
        (status = 400, description = "Game ID required"),
        (status = 404, description = "Game not found")
    )
)]
pub async fn submit_scores_by_query(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<GameIdQuery>,
    ApiJson(payload): ApiJson<SubmitScoresRequest>,
) -> Result<(StatusCode, Json<RoundSummary>), AppError> {
    let id = game_service::parse_game_id(query.game_id.as_deref())?;
    let round = game_service::submit_scores(&state, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(round)))
}
