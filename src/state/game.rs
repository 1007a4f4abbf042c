//! Authoritative in-memory model of a scoring session.
//!
//! The same types are persisted by the storage backends, so their serde shape
//! is the persisted record layout.

use std::{fmt, str::FromStr};

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Length of server-generated game identifiers.
pub const GENERATED_GAME_ID_LENGTH: usize = 6;
/// Longest identifier accepted from clients.
pub const MAX_GAME_ID_LENGTH: usize = 32;

/// Short, case-insensitive alphanumeric token identifying a game.
///
/// Identifiers are stored upper-cased so `z9x2k1` and `Z9X2K1` name the same game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

/// Rejection raised when a client-supplied game identifier is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidGameId {
    /// Nothing left after trimming.
    #[error("game id must not be empty")]
    Empty,
    /// More than [`MAX_GAME_ID_LENGTH`] characters.
    #[error("game id must be at most {MAX_GAME_ID_LENGTH} characters")]
    TooLong,
    /// Contains something other than ASCII letters and digits.
    #[error("game id `{0}` must only contain letters and digits")]
    InvalidCharacters(String),
}

impl GameId {
    /// Normalize and validate a client-supplied identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidGameId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidGameId::Empty);
        }
        if trimmed.len() > MAX_GAME_ID_LENGTH {
            return Err(InvalidGameId::TooLong);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidGameId::InvalidCharacters(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Draw a fresh random identifier. Uniqueness is only enforced when the game is stored.
    pub fn generate() -> Self {
        let token = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_GAME_ID_LENGTH)
            .map(|byte| char::from(byte).to_ascii_uppercase())
            .collect();
        Self(token)
    }

    /// Borrow the normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameId {
    type Err = InvalidGameId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GameId {
    type Error = InvalidGameId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GameId> for String {
    fn from(value: GameId) -> Self {
        value.0
    }
}

/// Identifier of a player, unique within its game and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Allocate a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed palette of Mexican Train colors. Each color is used by at most one player per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrainColor {
    Red,
    White,
    Green,
    Orange,
    Brown,
    Black,
    Blue,
    Pink,
    Yellow,
}

impl TrainColor {
    /// Every color in palette order.
    pub const ALL: [TrainColor; 9] = [
        TrainColor::Red,
        TrainColor::White,
        TrainColor::Green,
        TrainColor::Orange,
        TrainColor::Brown,
        TrainColor::Black,
        TrainColor::Blue,
        TrainColor::Pink,
        TrainColor::Yellow,
    ];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TrainColor::Red => "red",
            TrainColor::White => "white",
            TrainColor::Green => "green",
            TrainColor::Orange => "orange",
            TrainColor::Brown => "brown",
            TrainColor::Black => "black",
            TrainColor::Blue => "blue",
            TrainColor::Pink => "pink",
            TrainColor::Yellow => "yellow",
        }
    }
}

impl fmt::Display for TrainColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection for a color outside the palette.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown train color `{0}`")]
pub struct UnknownTrainColor(pub String);

impl FromStr for TrainColor {
    type Err = UnknownTrainColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        TrainColor::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownTrainColor(s.to_string()))
    }
}

/// Participant of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub train_color: TrainColor,
    /// One entry per recorded round; index `i` holds the score of round `i + 1`.
    pub scores: Vec<u32>,
    /// Tracked from someone else's device rather than a connection of their own.
    pub is_offline: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Player {
    /// Sum of every recorded round. Lower is better.
    pub fn total_score(&self) -> u64 {
        self.scores.iter().map(|&score| u64::from(score)).sum()
    }
}

/// Score awarded to one player in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: u32,
}

/// Completed scoring cycle. Immutable once appended to a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_number: u32,
    pub scores: Vec<RoundScore>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Sanitized score submitted by a client for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub player_id: String,
    pub score: u32,
}

/// Player definition requested by a client.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub name: String,
    pub train_color: TrainColor,
    pub is_offline: bool,
}

/// Invariant violations detected while mutating a [`Game`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("player name must not be empty")]
    EmptyName,
    #[error("A player with this name already exists")]
    NameTaken { name: String },
    #[error("This color is already taken")]
    ColorTaken { color: TrainColor },
    #[error("Game is full")]
    GameFull { max_players: usize },
}

/// One scored play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    pub name: String,
    /// Seating order; never re-sorted.
    pub players: Vec<Player>,
    pub rounds: Vec<Round>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Game {
    /// Build an empty game, deriving a display name from the id when none is given.
    pub fn new(id: GameId, name: Option<String>) -> Self {
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Mexican Train Game {id}"));

        Self {
            id,
            name,
            players: Vec::new(),
            rounds: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            is_active: true,
        }
    }

    /// Number of the next round to be recorded.
    pub fn current_round(&self) -> u32 {
        self.round_count() + 1
    }

    fn round_count(&self) -> u32 {
        u32::try_from(self.rounds.len()).unwrap_or(u32::MAX)
    }

    /// Look up a player by identifier.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id.as_str() == id)
    }

    /// Append a player after checking name and color uniqueness.
    ///
    /// A player joining mid-game gets a zero for every round already recorded so
    /// that score indexes keep lining up with round numbers.
    pub fn add_player(
        &mut self,
        request: NewPlayer,
        max_players: Option<usize>,
    ) -> Result<&Player, RosterError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }

        if let Some(max_players) = max_players {
            if self.players.len() >= max_players {
                return Err(RosterError::GameFull { max_players });
            }
        }

        let lowered = name.to_lowercase();
        if self
            .players
            .iter()
            .any(|player| player.name.to_lowercase() == lowered)
        {
            return Err(RosterError::NameTaken {
                name: name.to_string(),
            });
        }

        if self
            .players
            .iter()
            .any(|player| player.train_color == request.train_color)
        {
            return Err(RosterError::ColorTaken {
                color: request.train_color,
            });
        }

        self.players.push(Player {
            id: PlayerId::generate(),
            name: name.to_string(),
            train_color: request.train_color,
            scores: vec![0; self.rounds.len()],
            is_offline: request.is_offline,
            created_at: OffsetDateTime::now_utc(),
        });

        Ok(&self.players[self.players.len() - 1])
    }

    /// Record the next round. The round number is always derived from the
    /// current round count; players without an entry score 0.
    pub fn record_round(&mut self, entries: &[ScoreEntry]) -> &Round {
        let round_number = self.current_round();

        let scores = self
            .players
            .iter()
            .map(|player| RoundScore {
                player_id: player.id.clone(),
                player_name: player.name.clone(),
                score: entries
                    .iter()
                    .find(|entry| entry.player_id == player.id.as_str())
                    .map(|entry| entry.score)
                    .unwrap_or(0),
            })
            .collect::<Vec<_>>();

        for (player, entry) in self.players.iter_mut().zip(&scores) {
            player.scores.push(entry.score);
        }

        self.rounds.push(Round {
            round_number,
            scores,
            timestamp: OffsetDateTime::now_utc(),
        });

        &self.rounds[self.rounds.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        Game::new(GameId::parse("z9x2k1").unwrap(), None)
    }

    fn join(game: &mut Game, name: &str, color: TrainColor) -> Result<PlayerId, RosterError> {
        game.add_player(
            NewPlayer {
                name: name.into(),
                train_color: color,
                is_offline: false,
            },
            None,
        )
        .map(|player| player.id.clone())
    }

    #[test]
    fn game_ids_are_case_insensitive() {
        assert_eq!(GameId::parse(" z9x2k1 ").unwrap().as_str(), "Z9X2K1");
        assert_eq!(GameId::parse("Z9X2K1"), GameId::parse("z9X2k1"));
        assert_eq!(GameId::parse("   "), Err(InvalidGameId::Empty));
        assert!(matches!(
            GameId::parse("AB-12"),
            Err(InvalidGameId::InvalidCharacters(_))
        ));
        assert_eq!(GameId::parse(&"A".repeat(33)), Err(InvalidGameId::TooLong));
    }

    #[test]
    fn generated_ids_are_six_uppercase_alphanumerics() {
        for _ in 0..32 {
            let id = GameId::generate();
            assert_eq!(id.as_str().len(), GENERATED_GAME_ID_LENGTH);
            assert!(
                id.as_str()
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            );
            assert_eq!(GameId::parse(id.as_str()).unwrap(), id);
        }
    }

    #[test]
    fn colors_parse_case_insensitively() {
        assert_eq!("Red".parse::<TrainColor>().unwrap(), TrainColor::Red);
        assert_eq!(" yellow".parse::<TrainColor>().unwrap(), TrainColor::Yellow);
        assert!("purple".parse::<TrainColor>().is_err());
        assert_eq!(TrainColor::ALL.len(), 9);
    }

    #[test]
    fn default_name_mentions_the_id() {
        assert_eq!(game().name, "Mexican Train Game Z9X2K1");
        let named = Game::new(GameId::generate(), Some("  Friday night ".into()));
        assert_eq!(named.name, "Friday night");
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let mut game = game();
        join(&mut game, "Ann", TrainColor::Red).unwrap();
        let before = game.clone();

        let err = join(&mut game, "aNN", TrainColor::Blue).unwrap_err();
        assert!(matches!(err, RosterError::NameTaken { .. }));
        assert_eq!(game, before);
    }

    #[test]
    fn duplicate_colors_are_rejected() {
        let mut game = game();
        join(&mut game, "Ann", TrainColor::Red).unwrap();
        let before = game.clone();

        let err = join(&mut game, "Bo", TrainColor::Red).unwrap_err();
        assert_eq!(
            err,
            RosterError::ColorTaken {
                color: TrainColor::Red
            }
        );
        assert_eq!(game, before);
    }

    #[test]
    fn blank_names_and_full_games_are_rejected() {
        let mut game = game();
        assert_eq!(
            join(&mut game, "  ", TrainColor::Red),
            Err(RosterError::EmptyName)
        );

        join(&mut game, "Ann", TrainColor::Red).unwrap();
        let err = game
            .add_player(
                NewPlayer {
                    name: "Bo".into(),
                    train_color: TrainColor::Blue,
                    is_offline: true,
                },
                Some(1),
            )
            .unwrap_err();
        assert_eq!(err, RosterError::GameFull { max_players: 1 });
    }

    #[test]
    fn rounds_are_numbered_from_the_round_count() {
        let mut game = game();
        let ann = join(&mut game, "Ann", TrainColor::Red).unwrap();
        let bo = join(&mut game, "Bo", TrainColor::Blue).unwrap();

        let round = game.record_round(&[
            ScoreEntry {
                player_id: ann.to_string(),
                score: 15,
            },
            ScoreEntry {
                player_id: bo.to_string(),
                score: 0,
            },
        ]);
        assert_eq!(round.round_number, 1);
        assert_eq!(
            round
                .scores
                .iter()
                .map(|entry| entry.score)
                .collect::<Vec<_>>(),
            vec![15, 0]
        );

        assert_eq!(game.record_round(&[]).round_number, 2);
        assert_eq!(game.current_round(), 3);
        assert_eq!(game.players[0].scores, vec![15, 0]);
        assert_eq!(game.players[1].scores, vec![0, 0]);
        assert_eq!(game.players[0].total_score(), 15);
    }

    #[test]
    fn missing_and_unknown_entries_score_zero() {
        let mut game = game();
        join(&mut game, "Ann", TrainColor::Red).unwrap();
        let bo = join(&mut game, "Bo", TrainColor::Blue).unwrap();

        game.record_round(&[
            ScoreEntry {
                player_id: "ghost".into(),
                score: 50,
            },
            ScoreEntry {
                player_id: bo.to_string(),
                score: 7,
            },
        ]);

        assert_eq!(game.players[0].scores, vec![0]);
        assert_eq!(game.players[1].scores, vec![7]);
        assert!(
            game.players
                .iter()
                .all(|player| player.scores.len() == game.rounds.len())
        );
    }

    #[test]
    fn late_joiners_are_backfilled() {
        let mut game = game();
        join(&mut game, "Ann", TrainColor::Red).unwrap();
        game.record_round(&[]);
        game.record_round(&[]);

        join(&mut game, "Cy", TrainColor::Green).unwrap();
        assert_eq!(game.players[1].scores, vec![0, 0]);
    }

    #[test]
    fn persisted_shape_uses_camel_case() {
        let mut game = game();
        join(&mut game, "Ann", TrainColor::Pink).unwrap();
        game.record_round(&[]);

        let value = serde_json::to_value(&game).unwrap();
        assert_eq!(value["id"], "Z9X2K1");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["players"][0]["trainColor"], "pink");
        assert_eq!(value["players"][0]["isOffline"], false);
        assert_eq!(value["rounds"][0]["roundNumber"], 1);

        let back: Game = serde_json::from_value(value).unwrap();
        assert_eq!(back, game);
    }
}
