//! Dashboard user management (administrators and their roles).

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::types::{page_and_limit, AccountStatus, Ack, Paginated};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Users")
}

pub fn detail_tag(id: u64) -> Tag {
  Tag::detail("User", id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
  pub id: u64,
  pub name: String,
  pub email: String,
  pub role: String,
  pub status: AccountStatus,
  #[serde(default)]
  pub last_login_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub invited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  pub search: Option<String>,
  pub role: Option<String>,
  pub status: Option<AccountStatus>,
}

impl UserListParams {
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
pub struct Invitation {
  pub email: String,
  pub name: String,
  pub role: String,
}

#[derive(Serialize)]
struct RoleChange<'a> {
  role: &'a str,
}

#[derive(Serialize)]
struct StatusChange {
  status: AccountStatus,
}

#[derive(Clone)]
pub struct UsersApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl UsersApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self, params: UserListParams) -> Query<Paginated<AdminUser>> {
    let params = params.normalized();
    let fallback_params = params.clone();
    self.api.query(
      &self.cache,
      "getUserList",
      "/users",
      params,
      vec![list_tag()],
      move || fallback::users::list(&fallback_params),
    )
  }

  pub fn get(&self, id: u64) -> Query<AdminUser> {
    self.api.query(
      &self.cache,
      "getUserById",
      format!("/users/{}", id),
      (),
      vec![detail_tag(id)],
      move || fallback::users::detail(id),
    )
  }

  pub async fn invite(&self, invitation: &Invitation) -> Result<AdminUser> {
    self
      .cache
      .mutate(
        "inviteUser",
        &[list_tag()],
        self.api.post("/users/invite", invitation),
      )
      .await
  }

  pub async fn update_role(&self, id: u64, role: &str) -> Result<AdminUser> {
    self
      .cache
      .mutate(
        "updateUserRole",
        &[detail_tag(id)],
        self.api.patch(&format!("/users/{}/role", id), &RoleChange { role }),
      )
      .await
  }

  pub async fn set_status(&self, id: u64, status: AccountStatus) -> Result<AdminUser> {
    self
      .cache
      .mutate(
        "setUserStatus",
        &[detail_tag(id)],
        self.api.patch(&format!("/users/{}/status", id), &StatusChange { status }),
      )
      .await
  }

  pub async fn delete(&self, id: u64) -> Result<Ack> {
    self
      .cache
      .mutate(
        "deleteUser",
        &[list_tag(), detail_tag(id)],
        self.api.delete(&format!("/users/{}", id)),
      )
      .await
  }
}
