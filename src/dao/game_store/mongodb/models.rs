use mongodb::{
    bson::{Document, doc},
    error::{Error, ErrorKind, WriteFailure},
};
use serde::{Deserialize, Serialize};

use crate::state::game::{Game, GameId};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Stored shape of a game: the full record keyed by its identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    game: Game,
}

impl From<Game> for MongoGameDocument {
    fn from(game: Game) -> Self {
        Self {
            id: game.id.to_string(),
            game,
        }
    }
}

impl From<MongoGameDocument> for Game {
    fn from(value: MongoGameDocument) -> Self {
        value.game
    }
}

pub fn doc_id(id: &GameId) -> Document {
    doc! { "_id": id.as_str() }
}

/// Whether a driver error is a unique index violation.
pub fn is_duplicate_key(err: &Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}
