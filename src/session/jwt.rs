//! Unverified JWT payload decoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::UserIdentity;

/// The claims this client cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
  /// Expiry, seconds since the epoch
  pub exp: Option<i64>,
  /// Nested identity claim
  pub user: Option<UserIdentity>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Claims {
  /// Identity carried by the token: the nested `user` claim, or the
  /// equivalent top-level claims (`id`/`sub`, `name`, `email`, `role`).
  pub fn identity(&self) -> Result<UserIdentity> {
    if let Some(user) = &self.user {
      return Ok(user.clone());
    }

    let mut fields = Map::new();
    if let Some(id) = self.extra.get("id").or_else(|| self.extra.get("sub")) {
      fields.insert("id".to_string(), id.clone());
    }
    for name in ["name", "email", "role", "institution"] {
      if let Some(value) = self.extra.get(name) {
        fields.insert(name.to_string(), value.clone());
      }
    }

    serde_json::from_value(Value::Object(fields))
      .map_err(|e| eyre!("Token does not carry a user identity: {}", e))
  }

  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
  }
}

/// Decode the payload segment of `token`.
pub fn decode_claims(token: &str) -> Result<Claims> {
  let mut parts = token.split('.');
  let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
    (Some(_), Some(payload), Some(_), None) => payload,
    _ => return Err(eyre!("Malformed token: expected three segments")),
  };

  let bytes = URL_SAFE_NO_PAD
    .decode(payload.trim_end_matches('='))
    .map_err(|e| eyre!("Malformed token payload: {}", e))?;

  serde_json::from_slice(&bytes).map_err(|e| eyre!("Malformed token claims: {}", e))
}

/// Decode the identity carried by `token`.
pub fn decode_user(token: &str) -> Result<UserIdentity> {
  decode_claims(token)?.identity()
}

/// Expiry of `token`, if it can be decoded and carries one.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
  decode_claims(token).ok()?.expires_at()
}

/// True when the token expires at or before now, or cannot be decoded.
pub fn is_token_expired(token: &str) -> bool {
  is_token_expired_at(token, Utc::now())
}

/// True when the token expires at or before `now`.
///
/// Undecodable tokens and tokens without an `exp` claim count as expired.
pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
  match expires_at(token) {
    Some(expiry) => expiry <= now,
    None => true,
  }
}
