use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{
    error::AppError,
    services::{game_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/api/games/{game_id}/events",
    tag = "realtime",
    params(("game_id" = String, Path, description = "Game identifier, case-insensitive")),
    responses(
        (status = 200, description = "`game-update` event stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Malformed game id")
    )
)]
/// Stream full game snapshots as server-sent events.
pub async fn game_stream(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let id = game_service::parse_game_id(Some(&game_id))?;
    Ok(sse_service::game_stream(state, id).await)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api/games/{game_id}/events", get(game_stream))
}
