//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Anything a query can return.
///
/// Results are stored as JSON, so they must round-trip through serde.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Cacheable for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Result of a read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the underlying request completed
  pub fetched_at: DateTime<Utc>,
  /// Why the backend could not be used, when serving fallback data
  pub degraded_reason: Option<String>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
      degraded_reason: None,
    }
  }

  /// Create a new cache result from a stored entry.
  ///
  /// A stored fallback result keeps reporting itself as a fallback,
  /// along with the reason it was stored.
  pub fn from_cache(
    data: T,
    fetched_at: DateTime<Utc>,
    origin: CacheSource,
    degraded_reason: Option<String>,
  ) -> Self {
    match origin {
      CacheSource::Fallback => Self {
        data,
        source: CacheSource::Fallback,
        fetched_at,
        degraded_reason,
      },
      _ => Self {
        data,
        source: CacheSource::Cache,
        fetched_at,
        degraded_reason: None,
      },
    }
  }

  /// Create a result carrying fallback data.
  pub fn fallback(data: T, fetched_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
    Self {
      data,
      source: CacheSource::Fallback,
      fetched_at,
      degraded_reason: Some(reason.into()),
    }
  }

  /// True when `data` is substitute data rather than a backend response.
  pub fn is_degraded(&self) -> bool {
    self.source == CacheSource::Fallback
  }

  pub fn into_data(self) -> T {
    self.data
  }
}

/// Indicates where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Served from a fresh cache entry without a request
  Cache,
  /// Backend unavailable, static fallback data substituted
  Fallback,
}
