use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::format_timestamp,
    state::game::{Game, Player, Round, RoundScore, ScoreEntry, TrainColor},
};

/// Payload used to open a new game.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Shareable identifier; generated when omitted.
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub game_id: Option<String>,
    /// Display name; defaults to `Mexican Train Game <ID>`.
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,
}

/// Player joining a game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPlayerRequest {
    #[serde(alias = "playerName")]
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    /// One of the nine palette colors, case-insensitive.
    pub train_color: String,
    #[serde(default)]
    pub is_offline: bool,
}

/// Scores for the next round.
///
/// Read leniently: entries that are not objects are skipped and a missing or
/// non-array `scores` counts as no entries, so every player defaults to 0.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoresRequest {
    /// Advisory only; the server always assigns the next round number.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub round_number: Option<Value>,
    #[serde(default, deserialize_with = "array_or_empty")]
    #[schema(value_type = Vec<ScoreEntryInput>)]
    pub scores: Vec<Value>,
}

impl SubmitScoresRequest {
    /// Entries that name a player, with sanitized scores.
    pub fn entries(&self) -> Vec<ScoreEntry> {
        self.scores
            .iter()
            .filter_map(ScoreEntryInput::from_value)
            .filter_map(|entry| entry.resolve())
            .collect()
    }

    /// Round number suggested by the client, when it reads as an integer.
    pub fn suggested_round(&self) -> Option<i64> {
        match self.round_number.as_ref()? {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|round| round as i64)),
            Value::String(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }
}

fn array_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

/// One submitted score. Both fields are accepted loosely and sanitized.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntryInput {
    #[serde(default)]
    #[schema(value_type = String)]
    pub player_id: Value,
    #[serde(default)]
    #[schema(value_type = u32)]
    pub score: Value,
}

impl ScoreEntryInput {
    /// Read one raw array element; anything but an object is skipped.
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Sanitized entry, or `None` when it does not name a player.
    pub fn resolve(&self) -> Option<ScoreEntry> {
        let player_id = match &self.player_id {
            Value::String(id) => id.trim().to_string(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        if player_id.is_empty() {
            return None;
        }

        Some(ScoreEntry {
            player_id,
            score: lenient_score(&self.score),
        })
    }
}

/// Coerce a submitted score to a non-negative integer, defaulting to 0.
///
/// Strings are read like `parseInt`: leading digits after an optional sign.
fn lenient_score(value: &Value) -> u32 {
    match value {
        Value::Number(number) => {
            if let Some(score) = number.as_u64() {
                u32::try_from(score).unwrap_or(u32::MAX)
            } else if let Some(score) = number.as_f64() {
                if score.is_finite() && score > 0.0 {
                    score.min(f64::from(u32::MAX)) as u32
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(raw) => {
            let raw = raw.trim_start();
            if raw.starts_with('-') {
                return 0;
            }
            let digits: String = raw
                .trim_start_matches('+')
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.is_empty() {
                0
            } else {
                digits.parse().unwrap_or(u32::MAX)
            }
        }
        _ => 0,
    }
}

/// Game snapshot returned by the API and pushed to observers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: String,
    pub name: String,
    pub players: Vec<PlayerSummary>,
    pub rounds: Vec<RoundSummary>,
    pub created_at: String,
    pub is_active: bool,
    /// Number of the next round to be recorded.
    pub current_round: u32,
}

/// Public projection of a player.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub train_color: TrainColor,
    pub scores: Vec<u32>,
    pub total_score: u64,
    pub is_offline: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round_number: u32,
    pub scores: Vec<RoundScoreSummary>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundScoreSummary {
    pub player_id: String,
    pub player_name: String,
    pub score: u32,
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id.to_string(),
            name: game.name.clone(),
            players: game.players.iter().map(PlayerSummary::from).collect(),
            rounds: game.rounds.iter().map(RoundSummary::from).collect(),
            created_at: format_timestamp(game.created_at),
            is_active: game.is_active,
            current_round: game.current_round(),
        }
    }
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.clone(),
            train_color: player.train_color,
            scores: player.scores.clone(),
            total_score: player.total_score(),
            is_offline: player.is_offline,
            created_at: format_timestamp(player.created_at),
        }
    }
}

impl From<&Round> for RoundSummary {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.round_number,
            scores: round.scores.iter().map(RoundScoreSummary::from).collect(),
            timestamp: format_timestamp(round.timestamp),
        }
    }
}

impl From<&RoundScore> for RoundScoreSummary {
    fn from(score: &RoundScore) -> Self {
        Self {
            player_id: score.player_id.to_string(),
            player_name: score.player_name.clone(),
            score: score.score,
        }
    }
}
