use color_eyre::Result;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use super::{jwt, Session, UserIdentity};
use crate::db::KeyValueStore;

/// Storage key of the access token
pub const TOKEN_KEY: &str = "token";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Holds the current session and mirrors every change to durable storage.
///
/// Cloning is cheap; all clones share the same session.
#[derive(Clone)]
pub struct SessionStore {
  session: Arc<RwLock<Session>>,
  storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
  /// Build the session from whatever `storage` holds.
  ///
  /// A stored token that cannot be decoded is treated as no session at all
  /// and both persisted tokens are cleared.
  pub fn rehydrate(storage: Arc<dyn KeyValueStore>) -> Self {
    let store = Self {
      session: Arc::new(RwLock::new(Session::default())),
      storage,
    };

    let token = match store.storage.get(TOKEN_KEY) {
      Ok(token) => token,
      Err(e) => {
        warn!(error = %e, "could not read persisted token, starting signed out");
        None
      }
    };

    let Some(token) = token else {
      return store;
    };

    match jwt::decode_user(&token) {
      Ok(user) => {
        let refresh_token = store.storage.get(REFRESH_TOKEN_KEY).ok().flatten();
        info!(user = %user.email, "restored persisted session");
        store.replace(Session {
          access_token: Some(token),
          refresh_token,
          user: Some(user),
          is_authenticated: true,
        });
      }
      Err(e) => {
        warn!(error = %e, "persisted token is corrupt, clearing session");
        store.clear_storage();
      }
    }

    store
  }

  /// Install a new token pair.
  ///
  /// `user` is decoded from `token` when not supplied; a token that cannot be
  /// decoded in that case is rejected and the session is left untouched.
  pub fn set_credentials(
    &self,
    token: &str,
    refresh_token: &str,
    user: Option<UserIdentity>,
  ) -> Result<()> {
    let user = match user {
      Some(user) => user,
      None => jwt::decode_user(token)?,
    };

    self.replace(Session {
      access_token: Some(token.to_string()),
      refresh_token: Some(refresh_token.to_string()),
      user: Some(user),
      is_authenticated: true,
    });

    self.storage.set(TOKEN_KEY, token)?;
    self.storage.set(REFRESH_TOKEN_KEY, refresh_token)?;

    Ok(())
  }

  /// Drop the session and its persisted tokens.
  pub fn logout(&self) {
    let was_authenticated = self.is_authenticated();
    self.replace(Session::default());
    self.clear_storage();
    if was_authenticated {
      info!("session cleared");
    }
  }

  pub fn snapshot(&self) -> Session {
    self
      .session
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn access_token(&self) -> Option<String> {
    self.read(|s| s.access_token.clone())
  }

  pub fn refresh_token(&self) -> Option<String> {
    self.read(|s| s.refresh_token.clone())
  }

  pub fn user(&self) -> Option<UserIdentity> {
    self.read(|s| s.user.clone())
  }

  pub fn is_authenticated(&self) -> bool {
    self.read(|s| s.is_authenticated)
  }

  fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
    f(&self.session.read().unwrap_or_else(PoisonError::into_inner))
  }

  fn replace(&self, session: Session) {
    *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
  }

  fn clear_storage(&self) {
    for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
      if let Err(e) = self.storage.remove(key) {
        warn!(key, error = %e, "failed to remove persisted token");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::{Database, MemoryStore};
  use crate::test_support::{admin_token, token_expiring_in};
  use chrono::Duration;

  #[test]
  fn test_set_credentials_persists_and_decodes_user() {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::rehydrate(storage.clone());
    assert!(!store.is_authenticated());

    let token = admin_token(Duration::hours(1));
    store.set_credentials(&token, "refresh-1", None).unwrap();

    let session = store.snapshot();
    assert!(session.is_authenticated);
    assert_eq!(session.access_token.as_deref(), Some(token.as_str()));
    assert_eq!(session.user.unwrap().email, "ada@school.test");
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), Some(token));
    assert_eq!(
      storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
      Some("refresh-1")
    );
  }

  #[test]
  fn test_explicit_user_wins_over_token() {
    let store = SessionStore::rehydrate(Arc::new(MemoryStore::new()));
    let user = UserIdentity {
      id: "9".into(),
      name: "Explicit".into(),
      email: "explicit@school.test".into(),
      role: "viewer".into(),
      institution: None,
    };

    // The token carries no identity, but the caller supplied one
    let token = token_expiring_in(Duration::hours(1));
    store
      .set_credentials(&token, "r", Some(user.clone()))
      .unwrap();
    assert_eq!(store.user(), Some(user));
  }

  #[test]
  fn test_undecodable_token_is_rejected() {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::rehydrate(storage.clone());

    assert!(store.set_credentials("garbage", "r", None).is_err());
    assert!(!store.is_authenticated());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_logout_clears_memory_and_storage() {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::rehydrate(storage.clone());
    store
      .set_credentials(&admin_token(Duration::hours(1)), "r", None)
      .unwrap();

    store.logout();

    assert_eq!(store.snapshot(), Session::default());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_restart_rehydrates_from_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");
    let token = admin_token(Duration::hours(1));

    {
      let store = SessionStore::rehydrate(Arc::new(Database::open(&path).unwrap()));
      store.set_credentials(&token, "refresh-1", None).unwrap();
    }

    // Simulated process restart
    let store = SessionStore::rehydrate(Arc::new(Database::open(&path).unwrap()));
    let session = store.snapshot();
    assert!(session.is_authenticated);
    assert_eq!(session.access_token, Some(token));
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(session.user.unwrap().id, "1");
  }

  #[test]
  fn test_corrupt_persisted_token_is_cleared() {
    let storage = Arc::new(MemoryStore::new());
    storage.set(TOKEN_KEY, "corrupt").unwrap();
    storage.set(REFRESH_TOKEN_KEY, "refresh").unwrap();

    let store = SessionStore::rehydrate(storage.clone());

    assert!(!store.is_authenticated());
    assert_eq!(store.user(), None);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn test_expired_but_valid_token_is_rehydrated() {
    let storage = Arc::new(MemoryStore::new());
    storage
      .set(TOKEN_KEY, &admin_token(Duration::hours(-1)))
      .unwrap();

    // Expiry is the refresher's business, not rehydration's
    let store = SessionStore::rehydrate(storage);
    assert!(store.is_authenticated());
  }
}
