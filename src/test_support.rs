//! Shared fixtures for unit tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use httpmock::MockServer;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::App;
use crate::config::Config;
use crate::db::MemoryStore;

/// Unsigned JWT carrying `claims`.
pub fn make_token(claims: Value) -> String {
  let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "HS256", "typ": "JWT" }).to_string());
  let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
  format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

/// Token with only an `exp` claim, `valid_for` from now (negative = expired).
pub fn token_expiring_in(valid_for: Duration) -> String {
  make_token(json!({ "exp": (Utc::now() + valid_for).timestamp() }))
}

/// Token for Ada Admin (id 1) of Lagos Prep.
pub fn admin_token(valid_for: Duration) -> String {
  make_token(json!({
    "exp": (Utc::now() + valid_for).timestamp(),
    "user": {
      "id": 1,
      "name": "Ada Admin",
      "email": "ada@school.test",
      "role": "admin",
      "institution": "Lagos Prep"
    }
  }))
}

/// Application talking to `server`, with in-memory token storage.
pub fn app_for(server: &MockServer) -> App {
  let yaml = format!("api:\n  url: {}\n  timeout_secs: 5\n", server.base_url());
  let config = Config::from_yaml(&yaml).expect("test config");
  App::with_storage(config, Arc::new(MemoryStore::new())).expect("test app")
}
