//! Error types raised by the MongoDB storage implementation.

use thiserror::Error;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The connection string could not be parsed.
    #[error("invalid MongoDB URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// The driver refused the client options.
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    /// The server never answered the initial ping.
    #[error("MongoDB did not answer ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    /// A health-check ping failed.
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    /// Writing a game document failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        id: String,
        #[source]
        source: mongodb::error::Error,
    },
    /// Reading a game document failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        id: String,
        #[source]
        source: mongodb::error::Error,
    },
}
