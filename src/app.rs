use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::{
  AnalyticsApi, ApiClient, AuthApi, ContentApi, FeaturesApi, PaymentsApi, SettingsApi, StaffApi,
  StudentsApi, UsersApi,
};
use crate::cache::CacheLayer;
use crate::config::Config;
use crate::db::{Database, KeyValueStore};
use crate::session::{SessionRefresher, SessionStore};

/// Wires configuration, persisted session, cache and HTTP client together
/// and hands out the per-domain clients.
///
/// Domain clients are cheap handles sharing one session and one cache.
pub struct App {
  config: Config,
  storage: Arc<dyn KeyValueStore>,
  session: SessionStore,
  cache: CacheLayer,
  api: ApiClient,
}

impl App {
  /// Build the application with the SQLite session store from the config.
  pub fn new(config: Config) -> Result<Self> {
    let path = config.session_db_path()?;
    let db = Database::open(&path)?;
    debug!(path = %path.display(), "opened session store");
    Self::with_storage(config, Arc::new(db))
  }

  /// Build the application on top of an arbitrary token store.
  pub fn with_storage(config: Config, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
    let session = SessionStore::rehydrate(Arc::clone(&storage));
    let cache = CacheLayer::from_config(&config.cache);
    let api = ApiClient::new(&config.api, session.clone())?;

    Ok(Self {
      config,
      storage,
      session,
      cache,
      api,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
    &self.storage
  }

  pub fn session(&self) -> &SessionStore {
    &self.session
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  pub fn api(&self) -> &ApiClient {
    &self.api
  }

  pub fn auth(&self) -> AuthApi {
    AuthApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn students(&self) -> StudentsApi {
    StudentsApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn staff(&self) -> StaffApi {
    StaffApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn payments(&self) -> PaymentsApi {
    PaymentsApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn content(&self) -> ContentApi {
    ContentApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn features(&self) -> FeaturesApi {
    FeaturesApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn settings(&self) -> SettingsApi {
    SettingsApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn analytics(&self) -> AnalyticsApi {
    AnalyticsApi::new(self.api.clone(), self.cache.clone())
  }

  pub fn users(&self) -> UsersApi {
    UsersApi::new(self.api.clone(), self.cache.clone())
  }

  /// Refresher on the configured interval. Call `spawn` to start it.
  pub fn refresher(&self) -> SessionRefresher {
    SessionRefresher::new(self.auth(), self.config.session.refresh_interval())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::admin_token;
  use chrono::Duration;
  use tempfile::TempDir;

  #[test]
  fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
      "api:\n  url: https://api.example.com\nsession:\n  storage_path: {}\n",
      dir.path().join("session.db").display()
    );
    let token = admin_token(Duration::hours(1));

    {
      let app = App::new(Config::from_yaml(&yaml).unwrap()).unwrap();
      assert!(!app.session().is_authenticated());
      app.session().set_credentials(&token, "refresh-1", None).unwrap();
    }

    let app = App::new(Config::from_yaml(&yaml).unwrap()).unwrap();
    assert!(app.session().is_authenticated());
    assert_eq!(app.session().access_token(), Some(token));
    assert_eq!(app.session().user().unwrap().email, "ada@school.test");

    app.session().logout();
    let app = App::new(Config::from_yaml(&yaml).unwrap()).unwrap();
    assert!(!app.session().is_authenticated());
  }
}
