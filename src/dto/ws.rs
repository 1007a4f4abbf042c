use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dto::game::GameSummary, state::game::Game};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "ping")]
    Ping,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to WebSocket and SSE observers.
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full snapshot of the observed game.
    #[serde(rename = "game-update")]
    GameUpdate { game: GameSummary },
    #[serde(rename = "pong")]
    Pong,
}

impl ServerMessage {
    pub fn game_update(game: &Game) -> Self {
        Self::GameUpdate {
            game: GameSummary::from(game),
        }
    }
}
