use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tally Train.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::get_game_by_query,
        crate::routes::game::add_player,
        crate::routes::game::add_player_by_query,
        crate::routes::game::submit_scores,
        crate::routes::game::submit_scores_by_query,
        crate::routes::sse::game_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::websocket::ws_handler_by_query,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::AddPlayerRequest,
            crate::dto::game::SubmitScoresRequest,
            crate::dto::game::ScoreEntryInput,
            crate::dto::game::GameSummary,
            crate::dto::game::PlayerSummary,
            crate::dto::game::RoundSummary,
            crate::dto::game::RoundScoreSummary,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::state::game::TrainColor,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game, player and score operations"),
        (name = "realtime", description = "WebSocket and server-sent event game updates"),
    )
)]
pub struct ApiDoc;
