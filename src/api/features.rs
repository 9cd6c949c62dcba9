//! Feature flags of the institution's plan.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::{path_segment, ApiClient};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Features")
}

pub fn detail_tag(key: &str) -> Tag {
  Tag::detail("Feature", key)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
  pub key: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub enabled: bool,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct Toggle {
  enabled: bool,
}

#[derive(Clone)]
pub struct FeaturesApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl FeaturesApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self) -> Query<Vec<FeatureFlag>> {
    self.api.query(
      &self.cache,
      "getFeatureList",
      "/features",
      (),
      vec![list_tag()],
      fallback::features::list,
    )
  }

  pub fn get(&self, key: &str) -> Query<FeatureFlag> {
    let fallback_key = key.to_string();
    self.api.query(
      &self.cache,
      "getFeatureByKey",
      format!("/features/{}", path_segment(key)),
      (),
      vec![detail_tag(key)],
      move || fallback::features::detail(&fallback_key),
    )
  }

  /// The list shows every flag's state, so toggling one invalidates it too.
  pub async fn set_enabled(&self, key: &str, enabled: bool) -> Result<FeatureFlag> {
    self
      .cache
      .mutate(
        "setFeatureEnabled",
        &[detail_tag(key), list_tag()],
        self
          .api
          .patch(&format!("/features/{}", path_segment(key)), &Toggle { enabled }),
      )
      .await
  }
}
