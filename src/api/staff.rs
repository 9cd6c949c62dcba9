//! Staff management.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::types::{page_and_limit, AccountStatus, Ack, Paginated};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Staff")
}

pub fn detail_tag(id: u64) -> Tag {
  Tag::detail("Staff", id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
  pub id: u64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub role: String,
  #[serde(default)]
  pub department: Option<String>,
  #[serde(default)]
  pub subjects: Vec<String>,
  pub status: AccountStatus,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  pub search: Option<String>,
  pub department: Option<String>,
  pub status: Option<AccountStatus>,
}

impl StaffListParams {
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
pub struct NewStaffMember {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub role: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub subjects: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subjects: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<AccountStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStaffUpdate {
  pub ids: Vec<u64>,
  #[serde(flatten)]
  pub changes: StaffUpdate,
}

#[derive(Clone)]
pub struct StaffApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl StaffApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self, params: StaffListParams) -> Query<Paginated<StaffMember>> {
    let params = params.normalized();
    let fallback_params = params.clone();
    self.api.query(
      &self.cache,
      "getStaffList",
      "/staff",
      params,
      vec![list_tag()],
      move || fallback::staff::list(&fallback_params),
    )
  }

  pub fn get(&self, id: u64) -> Query<StaffMember> {
    self.api.query(
      &self.cache,
      "getStaffById",
      format!("/staff/{}", id),
      (),
      vec![detail_tag(id)],
      move || fallback::staff::detail(id),
    )
  }

  pub async fn create(&self, member: &NewStaffMember) -> Result<StaffMember> {
    self
      .cache
      .mutate("createStaff", &[list_tag()], self.api.post("/staff", member))
      .await
  }

  pub async fn update(&self, id: u64, changes: &StaffUpdate) -> Result<StaffMember> {
    self
      .cache
      .mutate(
        "updateStaff",
        &[detail_tag(id)],
        self.api.put(&format!("/staff/{}", id), changes),
      )
      .await
  }

  pub async fn delete(&self, id: u64) -> Result<Ack> {
    self
      .cache
      .mutate(
        "deleteStaff",
        &[list_tag(), detail_tag(id)],
        self.api.delete(&format!("/staff/{}", id)),
      )
      .await
  }

  pub async fn bulk_update(&self, update: &BulkStaffUpdate) -> Result<Ack> {
    let mut tags = vec![list_tag()];
    tags.extend(update.ids.iter().copied().map(detail_tag));
    self
      .cache
      .mutate("bulkUpdateStaff", &tags, self.api.patch("/staff/bulk", update))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::test_support::app_for;
  use httpmock::prelude::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_get_falls_back_with_requested_id() {
    let server = MockServer::start();
    let detail = server.mock(|when, then| {
      when.method(GET).path("/enterprise/staff/7");
      then.status(503).body("upstream unavailable");
    });

    let app = app_for(&server);
    let result = app.staff().get(7).fetch().await;

    assert_eq!(result.source, CacheSource::Fallback);
    assert_eq!(result.data.id, 7);
    assert!(result.degraded_reason.unwrap().contains("503"));
    detail.assert_hits(1);

    // Cached fallback still reports itself as degraded
    let again = app.staff().get(7).fetch().await;
    assert!(again.is_degraded());
    assert_eq!(again.data.id, 7);
    detail.assert_hits(1);
  }

  #[tokio::test]
  async fn test_bulk_update_invalidates_every_touched_detail() {
    let server = MockServer::start();
    let member = |id: u64| {
      json!({
        "id": id,
        "firstName": "Ngozi",
        "lastName": "Eze",
        "email": "ngozi@school.test",
        "role": "teacher",
        "status": "active"
      })
    };
    let one = server.mock(|when, then| {
      when.method(GET).path("/enterprise/staff/1");
      then.status(200).json_body(member(1));
    });
    let two = server.mock(|when, then| {
      when.method(GET).path("/enterprise/staff/2");
      then.status(200).json_body(member(2));
    });
    let three = server.mock(|when, then| {
      when.method(GET).path("/enterprise/staff/3");
      then.status(200).json_body(member(3));
    });
    server.mock(|when, then| {
      when.method(PATCH).path("/enterprise/staff/bulk");
      then.status(200).json_body(json!({ "success": true }));
    });

    let app = app_for(&server);
    let staff = app.staff();
    let mut observers = vec![
      staff.get(1).watch(Default::default()),
      staff.get(2).watch(Default::default()),
      staff.get(3).watch(Default::default()),
    ];
    for observer in observers.iter_mut() {
      observer.settled().await;
    }

    let ack = staff
      .bulk_update(&BulkStaffUpdate {
        ids: vec![1, 2],
        changes: StaffUpdate {
          status: Some(AccountStatus::Inactive),
          ..Default::default()
        },
      })
      .await
      .unwrap();
    assert!(ack.success);

    one.assert_hits(2);
    two.assert_hits(2);
    three.assert_hits(1);
  }

  #[tokio::test]
  async fn test_list_falls_back_once_then_caches() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/staff");
      then.status(503);
    });

    let app = app_for(&server);
    let params = StaffListParams::page(1, 10);
    for _ in 0..2 {
      let page = app.staff().list(params.clone()).fetch().await;
      assert!(page.is_degraded());
      assert_eq!(page.data, fallback::staff::list(&params));
    }
    list.assert_hits(1);
  }
}
