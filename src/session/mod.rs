//! Session state: tokens, the identity decoded from them, and the
//! background task that keeps them fresh.
//!
//! - `jwt` decodes access tokens without verifying them (the backend does that)
//! - `store` holds the current session and mirrors it to durable storage
//! - `refresher` periodically swaps an expired access token for a new one

pub mod jwt;
mod refresher;
mod store;

pub use refresher::{RefreshHandle, RefreshOutcome, SessionRefresher};
pub use store::{SessionStore, REFRESH_TOKEN_KEY, TOKEN_KEY};

use serde::{Deserialize, Deserializer, Serialize};

/// Identity of the signed-in administrator, carried inside the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub role: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub institution: Option<String>,
}

/// In-memory view of the session.
///
/// `is_authenticated` always equals `access_token.is_some()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
  pub access_token: Option<String>,
  pub refresh_token: Option<String>,
  pub user: Option<UserIdentity>,
  pub is_authenticated: bool,
}

/// Ids arrive as either JSON strings or numbers depending on the issuer.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(i64),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Text(s) => s,
    Id::Number(n) => n.to_string(),
  })
}
