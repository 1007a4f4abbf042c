//! Translates validated requests into session operations and shapes the responses.

use validator::Validate;

use crate::{
    dto::game::{
        AddPlayerRequest, CreateGameRequest, GameSummary, PlayerSummary, RoundSummary,
        SubmitScoresRequest,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::{GameId, NewPlayer, TrainColor},
    },
};

/// Parse a client-supplied identifier, reporting a missing one the way the query routes expect.
pub fn parse_game_id(raw: Option<&str>) -> Result<GameId, ServiceError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(GameId::parse(raw)?),
        None => Err(ServiceError::InvalidInput("Game ID required".into())),
    }
}

/// Create a game, generating its identifier when the client did not supply one.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    request.validate()?;

    let id = match request.game_id.as_deref() {
        Some(raw) => GameId::parse(raw)?,
        None => GameId::generate(),
    };

    let game = state.sessions().create_game(id, request.name).await?;
    Ok(GameSummary::from(&game))
}

pub async fn get_game(state: &SharedState, id: &GameId) -> Result<GameSummary, ServiceError> {
    let game = state.sessions().get_game(id).await?;
    Ok(GameSummary::from(&game))
}

/// Add a player to an existing game.
pub async fn add_player(
    state: &SharedState,
    id: &GameId,
    request: AddPlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    request.validate()?;
    let train_color: TrainColor = request.train_color.parse()?;

    let player = state
        .sessions()
        .add_player(
            id,
            NewPlayer {
                name: request.name,
                train_color,
                is_offline: request.is_offline,
            },
        )
        .await?;

    Ok(PlayerSummary::from(&player))
}

/// Record the next round of a game.
pub async fn submit_scores(
    state: &SharedState,
    id: &GameId,
    request: SubmitScoresRequest,
) -> Result<RoundSummary, ServiceError> {
    let round = state
        .sessions()
        .submit_round(id, request.entries(), request.suggested_round())
        .await?;

    Ok(RoundSummary::from(&round))
}
