//! Student management.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::types::{page_and_limit, AccountStatus, Ack, Paginated};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Students")
}

pub fn detail_tag(id: u64) -> Tag {
  Tag::detail("Student", id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id: u64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub class_level: Option<String>,
  pub status: AccountStatus,
  #[serde(default)]
  pub subjects: Vec<String>,
  #[serde(default)]
  pub average_score: Option<f64>,
  #[serde(default)]
  pub guardian_name: Option<String>,
  #[serde(default)]
  pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
  pub subject: String,
  pub average_score: f64,
  pub tests_taken: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
  pub test: String,
  pub subject: String,
  pub score: f64,
  pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
  pub student_id: u64,
  pub average_score: f64,
  pub tests_taken: u32,
  #[serde(default)]
  pub subjects: Vec<SubjectScore>,
  #[serde(default)]
  pub recent_attempts: Vec<TestAttempt>,
}

/// Filters of the student list. Paging defaults to page 1 of 10.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  pub search: Option<String>,
  pub status: Option<AccountStatus>,
  pub class_level: Option<String>,
}

impl StudentListParams {
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
pub struct NewStudent {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub class_level: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub subjects: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub guardian_name: Option<String>,
}

/// Partial update; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub class_level: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<AccountStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subjects: Option<Vec<String>>,
}

/// The same update applied to several students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStudentUpdate {
  pub ids: Vec<u64>,
  #[serde(flatten)]
  pub changes: StudentUpdate,
}

#[derive(Clone)]
pub struct StudentsApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl StudentsApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self, params: StudentListParams) -> Query<Paginated<Student>> {
    let params = params.normalized();
    let fallback_params = params.clone();
    self.api.query(
      &self.cache,
      "getStudentList",
      "/students",
      params,
      vec![list_tag()],
      move || fallback::students::list(&fallback_params),
    )
  }

  pub fn get(&self, id: u64) -> Query<Student> {
    self.api.query(
      &self.cache,
      "getStudentById",
      format!("/students/{}", id),
      (),
      vec![detail_tag(id)],
      move || fallback::students::detail(id),
    )
  }

  pub fn performance(&self, id: u64) -> Query<StudentPerformance> {
    self.api.query(
      &self.cache,
      "getStudentPerformance",
      format!("/students/{}/performance", id),
      (),
      vec![detail_tag(id)],
      move || fallback::students::performance(id),
    )
  }

  pub async fn create(&self, student: &NewStudent) -> Result<Student> {
    self
      .cache
      .mutate("createStudent", &[list_tag()], self.api.post("/students", student))
      .await
  }

  pub async fn update(&self, id: u64, changes: &StudentUpdate) -> Result<Student> {
    self
      .cache
      .mutate(
        "updateStudent",
        &[detail_tag(id)],
        self.api.put(&format!("/students/{}", id), changes),
      )
      .await
  }

  pub async fn delete(&self, id: u64) -> Result<Ack> {
    self
      .cache
      .mutate(
        "deleteStudent",
        &[list_tag(), detail_tag(id)],
        self.api.delete(&format!("/students/{}", id)),
      )
      .await
  }

  pub async fn bulk_update(&self, update: &BulkStudentUpdate) -> Result<Ack> {
    let mut tags = vec![list_tag()];
    tags.extend(update.ids.iter().copied().map(detail_tag));
    self
      .cache
      .mutate(
        "bulkUpdateStudents",
        &tags,
        self.api.patch("/students/bulk", update),
      )
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

  fn student_json(id: u64, first_name: &str) -> serde_json::Value {
    json!({
      "id": id,
      "firstName": first_name,
      "lastName": "Okafor",
      "email": format!("student{}@school.test", id),
      "status": "active"
    })
  }

  #[tokio::test]
  async fn test_list_is_cached_until_create_invalidates_it() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when
        .method(GET)
        .path("/enterprise/students")
        .query_param("page", "1")
        .query_param("limit", "10");
      then.status(200).json_body(json!({
        "data": {
          "items": [student_json(1, "Chidi")],
          "page": 1,
          "limit": 10,
          "total": 1,
          "totalPages": 1
        }
      }));
    });
    let create = server.mock(|when, then| {
      when.method(POST).path("/enterprise/students");
      then.status(201).json_body(student_json(2, "Amaka"));
    });

    let app = app_for(&server);
    let students = app.students();

    let first = students.list(StudentListParams::page(1, 10)).fetch().await;
    let second = students.list(StudentListParams::page(1, 10)).fetch().await;
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data.items[0].first_name, "Chidi");
    list.assert_hits(1);

    let created = students
      .create(&NewStudent {
        first_name: "Amaka".into(),
        last_name: "Okafor".into(),
        email: "student2@school.test".into(),
        phone: None,
        class_level: Some("SS2".into()),
        subjects: vec![],
        guardian_name: None,
      })
      .await
      .unwrap();
    assert_eq!(created.id, 2);
    create.assert_hits(1);

    let third = students.list(StudentListParams::page(1, 10)).fetch().await;
    assert_eq!(third.source, CacheSource::Network);
    list.assert_hits(2);
  }

  #[tokio::test]
  async fn test_default_paging_shares_the_explicit_entry() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students");
      then.status(200).json_body(json!({ "items": [], "total": 0 }));
    });

    let app = app_for(&server);
    app.students().list(StudentListParams::default()).fetch().await;
    app.students().list(StudentListParams::page(1, 10)).fetch().await;
    list.assert_hits(1);
  }

  #[tokio::test]
  async fn test_update_invalidates_detail_but_not_list() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students");
      then.status(200).json_body(json!({ "items": [student_json(4, "Tunde")] }));
    });
    let detail = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students/4");
      then.status(200).json_body(student_json(4, "Tunde"));
    });
    server.mock(|when, then| {
      when.method(PUT).path("/enterprise/students/4");
      then.status(200).json_body(student_json(4, "Tunde"));
    });

    let app = app_for(&server);
    let students = app.students();
    let _list = students.list(StudentListParams::default()).watch(Default::default());
    let mut detail_observer = students.get(4).watch(Default::default());
    detail_observer.settled().await;
    students.list(StudentListParams::default()).fetch().await;

    students
      .update(
        4,
        &StudentUpdate {
          class_level: Some("SS3".into()),
          ..Default::default()
        },
      )
      .await
      .unwrap();

    detail.assert_hits(2);
    list.assert_hits(1);
  }

  #[tokio::test]
  async fn test_failed_mutation_surfaces_error_and_keeps_cache() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students");
      then.status(200).json_body(json!({ "items": [] }));
    });
    server.mock(|when, then| {
      when.method(DELETE).path("/enterprise/students/9");
      then.status(403).json_body(json!({ "message": "Not allowed" }));
    });

    let app = app_for(&server);
    let students = app.students();
    students.list(StudentListParams::default()).fetch().await;

    let err = students.delete(9).await.unwrap_err();
    assert!(err.to_string().contains("Not allowed"));

    let again = students.list(StudentListParams::default()).fetch().await;
    assert_eq!(again.source, CacheSource::Cache);
    list.assert_hits(1);
  }

  #[tokio::test]
  async fn test_unreachable_backend_serves_fallback() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(GET).path("/enterprise/students/12/performance");
      then.status(500);
    });

    let app = app_for(&server);
    let result = app.students().performance(12).fetch().await;
    assert!(result.is_degraded());
    assert_eq!(result.data.student_id, 12);
  }

  #[tokio::test]
  async fn test_list_and_detail_fall_back_once_then_cache() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students");
      then.status(503);
    });
    let detail = server.mock(|when, then| {
      when.method(GET).path("/enterprise/students/3");
      then.status(503);
    });

    let app = app_for(&server);
    let params = StudentListParams::page(1, 10);
    for _ in 0..2 {
      let page = app.students().list(params.clone()).fetch().await;
      assert!(page.is_degraded());
      assert_eq!(page.data, fallback::students::list(&params));

      let student = app.students().get(3).fetch().await;
      assert!(student.is_degraded());
      assert_eq!(student.data, fallback::students::detail(3));
    }
    list.assert_hits(1);
    detail.assert_hits(1);
  }
}
