//! Question banks, passages and other exam content.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::types::{page_and_limit, Ack, Paginated};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Content")
}

pub fn detail_tag(id: u64) -> Tag {
  Tag::detail("Content", id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
  Draft,
  Published,
  Archived,
  #[serde(other)]
  Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
  pub id: u64,
  pub title: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub subject: String,
  pub status: ContentStatus,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub body: Option<String>,
  #[serde(default)]
  pub question_count: Option<u32>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  pub search: Option<String>,
  pub subject: Option<String>,
  pub status: Option<ContentStatus>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
}

impl ContentListParams {
  pub fn page(page: u32, limit: u32) -> Self {
    Self {
      page: Some(page),
      limit: Some(limit),
      ..Self::default()
    }
  }

  fn normalized(self) -> Self {
    let (page, limit) = page_and_limit(self.page, self.limit);
    Self {
      page: Some(page),
      limit: Some(limit),
      ..self
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContent {
  pub title: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub subject: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkContentUpdate {
  pub ids: Vec<u64>,
  #[serde(flatten)]
  pub changes: ContentUpdate,
}

#[derive(Clone)]
pub struct ContentApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl ContentApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self, params: ContentListParams) -> Query<Paginated<ContentItem>> {
    let params = params.normalized();
    let fallback_params = params.clone();
    self.api.query(
      &self.cache,
      "getContentList",
      "/content",
      params,
      vec![list_tag()],
      move || fallback::content::list(&fallback_params),
    )
  }

  pub fn get(&self, id: u64) -> Query<ContentItem> {
    self.api.query(
      &self.cache,
      "getContentById",
      format!("/content/{}", id),
      (),
      vec![detail_tag(id)],
      move || fallback::content::detail(id),
    )
  }

  pub async fn create(&self, content: &NewContent) -> Result<ContentItem> {
    self
      .cache
      .mutate("createContent", &[list_tag()], self.api.post("/content", content))
      .await
  }

  pub async fn update(&self, id: u64, changes: &ContentUpdate) -> Result<ContentItem> {
    self
      .cache
      .mutate(
        "updateContent",
        &[detail_tag(id)],
        self.api.put(&format!("/content/{}", id), changes),
      )
      .await
  }

  pub async fn publish(&self, id: u64) -> Result<ContentItem> {
    self
      .cache
      .mutate(
        "publishContent",
        &[detail_tag(id)],
        self.api.post(&format!("/content/{}/publish", id), &serde_json::json!({})),
      )
      .await
  }

  pub async fn delete(&self, id: u64) -> Result<Ack> {
    self
      .cache
      .mutate(
        "deleteContent",
        &[list_tag(), detail_tag(id)],
        self.api.delete(&format!("/content/{}", id)),
      )
      .await
  }

  pub async fn bulk_update(&self, update: &BulkContentUpdate) -> Result<Ack> {
    let mut tags = vec![list_tag()];
    tags.extend(update.ids.iter().copied().map(detail_tag));
    self
      .cache
      .mutate("bulkUpdateContent", &tags, self.api.patch("/content/bulk", update))
      .await
  }
}
