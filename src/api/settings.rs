//! Institution-wide settings.

use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn settings_tag() -> Tag {
  Tag::new("Settings")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
  pub email: bool,
  pub sms: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
  pub institution_name: String,
  pub contact_email: String,
  pub timezone: String,
  pub currency: String,
  pub default_exam_minutes: u32,
  pub pass_mark: u32,
  pub allow_self_registration: bool,
  pub notifications: NotificationSettings,
}

#[derive(Clone)]
pub struct SettingsApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl SettingsApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn get(&self) -> Query<Settings> {
    self.api.query(
      &self.cache,
      "getSettings",
      "/settings",
      (),
      vec![settings_tag()],
      fallback::settings::settings,
    )
  }

  pub async fn update(&self, settings: &Settings) -> Result<Settings> {
    self
      .cache
      .mutate(
        "updateSettings",
        &[settings_tag()],
        self.api.put("/settings", settings),
      )
      .await
  }
}
