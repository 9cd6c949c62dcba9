//! Read-only dashboard analytics.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::client::ApiClient;
use crate::cache::{CacheLayer, Tag};
use crate::fallback;
use crate::query::Query;

pub fn analytics_tag() -> Tag {
  Tag::new("Analytics")
}

/// Reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
  Week,
  #[default]
  Month,
  Quarter,
  Year,
}

impl Period {
  pub fn days(self) -> u32 {
    match self {
      Period::Week => 7,
      Period::Month => 30,
      Period::Quarter => 90,
      Period::Year => 365,
    }
  }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Period::Week => "week",
      Period::Month => "month",
      Period::Quarter => "quarter",
      Period::Year => "year",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
  pub period: Period,
  pub total_students: u64,
  pub active_students: u64,
  pub total_staff: u64,
  pub tests_taken: u64,
  pub average_score: f64,
  pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
  /// ISO date of the bucket start
  pub date: String,
  pub active_students: u64,
  pub tests_taken: u64,
  pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
  pub period: Period,
  #[serde(default)]
  pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
  pub subject: String,
  pub average_score: f64,
  pub tests_taken: u64,
  pub pass_rate: f64,
}

#[derive(Serialize)]
struct PeriodParams {
  period: Period,
}

#[derive(Clone)]
pub struct AnalyticsApi {
  api: ApiClient,
  cache: CacheLayer,
}

impl AnalyticsApi {
  pub fn new(api: ApiClient, cache: CacheLayer) -> Self {
    Self { api, cache }
  }

  pub fn overview(&self, period: Period) -> Query<Overview> {
    self.api.query(
      &self.cache,
      "getAnalyticsOverview",
      "/analytics/overview",
      PeriodParams { period },
      vec![analytics_tag()],
      move || fallback::analytics::overview(period),
    )
  }

  pub fn trends(&self, period: Period) -> Query<Trends> {
    self.api.query(
      &self.cache,
      "getAnalyticsTrends",
      "/analytics/trends",
      PeriodParams { period },
      vec![analytics_tag()],
      move || fallback::analytics::trends(period),
    )
  }

  pub fn subject_performance(&self) -> Query<Vec<SubjectPerformance>> {
    self.api.query(
      &self.cache,
      "getSubjectPerformance",
      "/analytics/subjects",
      (),
      vec![analytics_tag()],
      fallback::analytics::subject_performance,
    )
  }
}
