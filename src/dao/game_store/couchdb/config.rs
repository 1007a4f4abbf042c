//! Connection settings for the CouchDB store, read from `COUCH_*` variables.

use std::env;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "tally_train";

/// Where game documents live and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    /// Server root without a trailing slash.
    pub base_url: String,
    pub database: String,
    /// Basic-auth pair, set only when both halves are present.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Blank values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let base_url = var("COUCH_BASE_URL").ok_or(CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database: var("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
            credentials: var("COUCH_USERNAME").zip(var("COUCH_PASSWORD")),
        })
    }
}
