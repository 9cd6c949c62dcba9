//! Payments and revenue.

use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::types::{page_and_limit, Paginated};
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn list_tag() -> Tag {
  Tag::list("Payments")
}

pub fn detail_tag(id: u64) -> Tag {
  Tag::detail("Payment", id)
}

pub fn summary_tag() -> Tag {
  Tag::new("PaymentSummary")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Completed,
  Failed,
  Refunded,
  #[serde(other)]
  Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: u64,
  pub student_id: u64,
  #[serde(default)]
  pub student_name: Option<String>,
  pub amount: f64,
  pub currency: String,
  pub method: String,
  pub status: PaymentStatus,
  #[serde(default)]
  pub reference: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
  pub method: String,
  pub amount: f64,
  pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
  pub currency: String,
  pub total_revenue: f64,
  pub total_refunded: f64,
  pub pending_amount: f64,
  pub completed_count: u32,
  #[serde(default)]
  pub by_method: Vec<MethodTotal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  /// Matches student name or payment reference
  pub search: Option<String>,
  pub status: Option<PaymentStatus>,
  pub student_id: Option<u64>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

impl PaymentListParams {
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
pub struct NewPayment {
  pub student_id: u64,
  pub amount: f64,
  pub currency: String,
  pub method: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  /// Partial refund; the full amount when unset
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
}

#[derive(Clone)]
pub struct PaymentsApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl PaymentsApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn list(&self, params: PaymentListParams) -> Query<Paginated<Payment>> {
    let params = params.normalized();
    let fallback_params = params.clone();
    self.api.query(
      &self.cache,
      "getPaymentList",
      "/payments",
      params,
      vec![list_tag()],
      move || fallback::payments::list(&fallback_params),
    )
  }

  pub fn get(&self, id: u64) -> Query<Payment> {
    self.api.query(
      &self.cache,
      "getPaymentById",
      format!("/payments/{}", id),
      (),
      vec![detail_tag(id)],
      move || fallback::payments::detail(id),
    )
  }

  pub fn summary(&self) -> Query<PaymentSummary> {
    self.api.query(
      &self.cache,
      "getPaymentSummary",
      "/payments/summary",
      (),
      vec![summary_tag()],
      fallback::payments::summary,
    )
  }

  pub async fn record(&self, payment: &NewPayment) -> Result<Payment> {
    self
      .cache
      .mutate(
        "recordPayment",
        &[list_tag(), summary_tag()],
        self.api.post("/payments", payment),
      )
      .await
  }

  pub async fn refund(&self, id: u64, refund: &Refund) -> Result<Payment> {
    self
      .cache
      .mutate(
        "refundPayment",
        &[detail_tag(id), summary_tag()],
        self.api.post(&format!("/payments/{}/refund", id), refund),
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::app_for;
  use httpmock::prelude::*;
  use serde_json::json;

  fn summary_json() -> serde_json::Value {
    json!({
      "currency": "NGN",
      "totalRevenue": 1500000.0,
      "totalRefunded": 0.0,
      "pendingAmount": 25000.0,
      "completedCount": 60
    })
  }

  #[tokio::test]
  async fn test_refund_refreshes_summary_and_detail() {
    let server = MockServer::start();
    let summary = server.mock(|when, then| {
      when.method(GET).path("/enterprise/payments/summary");
      then.status(200).json_body(summary_json());
    });
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/payments");
      then.status(200).json_body(json!({ "items": [] }));
    });
    server.mock(|when, then| {
      when.method(POST).path("/enterprise/payments/31/refund");
      then.status(200).json_body(json!({
        "id": 31,
        "studentId": 4,
        "amount": 25000.0,
        "currency": "NGN",
        "method": "card",
        "status": "refunded"
      }));
    });

    let app = app_for(&server);
    let payments = app.payments();
    let mut summary_observer = payments.summary().watch(Default::default());
    let mut list_observer = payments.list(PaymentListParams::default()).watch(Default::default());
    summary_observer.settled().await;
    list_observer.settled().await;

    let refunded = payments
      .refund(
        31,
        &Refund {
          reason: Some("duplicate charge".into()),
          amount: None,
        },
      )
      .await
      .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    summary.assert_hits(2);
    list.assert_hits(1);
  }

  #[tokio::test]
  async fn test_summary_fallback_is_well_formed() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(GET).path("/enterprise/payments/summary");
      then.status(502);
    });

    let app = app_for(&server);
    let result = app.payments().summary().fetch().await;
    assert!(result.is_degraded());
    assert_eq!(result.data, fallback::payments::summary());
  }

  #[tokio::test]
  async fn test_list_and_detail_fall_back_once_then_cache() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when.method(GET).path("/enterprise/payments");
      then.status(503);
    });
    let detail = server.mock(|when, then| {
      when.method(GET).path("/enterprise/payments/2");
      then.status(503);
    });

    let app = app_for(&server);
    let params = PaymentListParams {
      search: Some("amaka".to_string()),
      ..PaymentListParams::page(1, 10)
    };
    for _ in 0..2 {
      let page = app.payments().list(params.clone()).fetch().await;
      assert!(page.is_degraded());
      assert_eq!(page.data, fallback::payments::list(&params));
      assert_eq!(page.data.items.len(), 1);

      let payment = app.payments().get(2).fetch().await;
      assert!(payment.is_degraded());
      assert_eq!(payment.data, fallback::payments::detail(2));
    }
    list.assert_hits(1);
    detail.assert_hits(1);
  }

  #[tokio::test]
  async fn test_search_reaches_the_backend() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
      when
        .method(GET)
        .path("/enterprise/payments")
        .query_param("search", "DEMO-00003");
      then.status(200).json_body(json!({ "items": [] }));
    });

    let app = app_for(&server);
    let params = PaymentListParams {
      search: Some(" DEMO-00003 ".to_string()),
      ..PaymentListParams::default()
    };
    let result = app.payments().list(params).fetch().await;
    assert!(!result.is_degraded());
    list.assert_hits(1);
  }
}
