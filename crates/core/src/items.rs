//! Items: durable links to one external institution connection.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Credential region. Each region has its own provider credentials and
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            other => Err(Error::InvalidRequest(format!("Unknown region '{}'", other))),
        }
    }
}

/// Secret access token for an item.
///
/// Deliberately implements neither `Display` nor `Serialize`; the raw value is
/// only reachable through [`AccessToken::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for placing it on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// A linked institution connection, owned by the ledger layer.
///
/// The engine reads the access token and cursor; it never persists the item.
/// A `None` cursor means "sync from the beginning of history".
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub access_token: AccessToken,
    pub region: Region,
    pub cursor: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(id: impl Into<String>, access_token: AccessToken, region: Region) -> Self {
        Self {
            id: id.into(),
            access_token,
            region,
            cursor: None,
            last_synced_at: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}
