use serde::{Deserialize, Serialize};

use crate::state::game::{Game, GameId};

pub const GAME_PREFIX: &str = "game::";

/// Document stored per game: the full game record plus CouchDB bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: Game,
}

/// Minimal projection used to read the current revision of a document.
#[derive(Debug, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_rev")]
    pub rev: String,
}

impl CouchGameDocument {
    pub fn new(game: Game, rev: Option<String>) -> Self {
        Self {
            id: game_doc_id(&game.id),
            rev,
            game,
        }
    }
}

pub fn game_doc_id(id: &GameId) -> String {
    format!("{GAME_PREFIX}{id}")
}
