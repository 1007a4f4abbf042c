//! MongoDB connection settings and the initial connect loop.

use std::{env, time::Duration};

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "tally_train";
/// Pings attempted before the first connection is abandoned.
const CONNECT_ATTEMPTS: u32 = 10;

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional, blank means the default).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var("MONGO_URI")
            .ok()
            .map(|uri| uri.trim().to_owned())
            .filter(|uri| !uri.is_empty())
            .ok_or(MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let options = ClientOptions::parse(&uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri { uri, source })?;

        Ok(Self {
            options,
            database_name: database_name(env::var("MONGO_DB").ok()),
        })
    }

    /// Open the configured database, pinging until the server answers.
    pub async fn open(&self) -> MongoResult<Database> {
        let database = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?
            .database(&self.database_name);

        let mut attempt = 1;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(database),
                Err(source) if attempt >= CONNECT_ATTEMPTS => {
                    return Err(MongoDaoError::InitialPing {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    let delay = backoff(attempt);
                    debug!(attempt, ?delay, error = %err, "MongoDB not answering yet");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn database_name(raw: Option<String>) -> String {
    raw.map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE.to_owned())
}

/// Pause after failed ping `attempt` (1-based): 250 ms, doubling, capped at 5 s.
fn backoff(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(5);
    Duration::from_millis(250 * factor).min(Duration::from_secs(5))
}
