//! Cache entry storage trait and in-memory implementation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::traits::CacheSource;

/// A stored query result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Serialized result
  pub data: Value,
  /// Whether `data` came from the backend or from fallback data
  pub source: CacheSource,
  /// When the result was fetched
  pub fetched_at: DateTime<Utc>,
  /// Set by tag invalidation; the next read refetches
  pub is_stale: bool,
  /// When the last subscriber went away (None while subscribed)
  pub unused_since: Option<DateTime<Utc>>,
  /// Why fallback data was stored instead of a backend response
  pub degraded_reason: Option<String>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  fn get(&self, key: &str) -> Option<CacheEntry>;

  /// Insert or overwrite an entry.
  fn put(&self, key: &str, entry: CacheEntry);

  /// Flag entries as stale. Returns how many existed.
  fn mark_stale(&self, keys: &HashSet<String>) -> usize;

  /// Update the subscriber bookkeeping of an entry.
  fn set_unused_since(&self, key: &str, since: Option<DateTime<Utc>>);

  /// Drop entries unused since at or before `cutoff`. Returns the dropped keys.
  fn evict_unused(&self, cutoff: DateTime<Utc>) -> Vec<String>;

  fn clear(&self);
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Option<CacheEntry> {
    None // Always miss
  }

  fn put(&self, _key: &str, _entry: CacheEntry) {}

  fn mark_stale(&self, _keys: &HashSet<String>) -> usize {
    0
  }

  fn set_unused_since(&self, _key: &str, _since: Option<DateTime<Utc>>) {}

  fn evict_unused(&self, _cutoff: DateTime<Utc>) -> Vec<String> {
    Vec::new()
  }

  fn clear(&self) {}
}

/// Process-local entry storage.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Option<CacheEntry> {
    self.entries().get(key).cloned()
  }

  fn put(&self, key: &str, entry: CacheEntry) {
    self.entries().insert(key.to_string(), entry);
  }

  fn mark_stale(&self, keys: &HashSet<String>) -> usize {
    let mut entries = self.entries();
    let mut marked = 0;
    for key in keys {
      if let Some(entry) = entries.get_mut(key) {
        entry.is_stale = true;
        marked += 1;
      }
    }
    marked
  }

  fn set_unused_since(&self, key: &str, since: Option<DateTime<Utc>>) {
    if let Some(entry) = self.entries().get_mut(key) {
      entry.unused_since = since;
    }
  }

  fn evict_unused(&self, cutoff: DateTime<Utc>) -> Vec<String> {
    let mut entries = self.entries();
    let expired: Vec<String> = entries
      .iter()
      .filter(|(_, e)| e.unused_since.is_some_and(|since| since <= cutoff))
      .map(|(key, _)| key.clone())
      .collect();

    for key in &expired {
      entries.remove(key);
    }
    expired
  }

  fn clear(&self) {
    self.entries().clear();
  }
}
