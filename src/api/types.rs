//! Shapes shared by several resource domains.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paginated<T> {
  #[serde(default)]
  pub items: Vec<T>,
  #[serde(default = "default_page")]
  pub page: u32,
  #[serde(default = "default_limit")]
  pub limit: u32,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub total_pages: u32,
}

fn default_page() -> u32 {
  DEFAULT_PAGE
}

fn default_limit() -> u32 {
  DEFAULT_LIMIT
}

impl<T: Clone> Paginated<T> {
  /// Cut the requested page out of a complete collection.
  pub fn paginate(all: &[T], page: u32, limit: u32) -> Self {
    let page = page.max(1);
    let limit = limit.max(1);
    let start = ((page - 1) as usize).saturating_mul(limit as usize);
    let items = all
      .iter()
      .skip(start)
      .take(limit as usize)
      .cloned()
      .collect();

    Self {
      items,
      page,
      limit,
      total: all.len() as u64,
      total_pages: (all.len() as u32).div_ceil(limit),
    }
  }
}

/// Paging parameters with the backend's defaults applied, so that a
/// request without paging shares its cache entry with an explicit
/// `page=1&limit=10`.
pub(crate) fn page_and_limit(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
  (
    page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
    limit
      .filter(|l| *l > 0)
      .unwrap_or(DEFAULT_LIMIT)
      .min(MAX_LIMIT),
  )
}

/// Account state shared by students, staff and dashboard users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
  Active,
  Inactive,
  Suspended,
  #[serde(other)]
  Unknown,
}

/// Acknowledgement body of endpoints that return nothing useful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
  #[serde(default = "acknowledged")]
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

fn acknowledged() -> bool {
  true
}
