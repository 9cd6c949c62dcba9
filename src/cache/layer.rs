//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::Report, Result};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::keys::{QueryKey, Tag};
use super::registry::TagRegistry;
use super::storage::{CacheEntry, CacheStorage, MemoryStorage, NoopStorage};
use super::traits::{CacheResult, CacheSource, Cacheable};
use crate::config::CacheConfig;

/// Produces a fresh network request for a query.
pub type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Produces the substitute result served when the network request fails.
pub type FallbackFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Re-runs a subscribed query after invalidation.
pub(crate) type Refetch = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Outcome of one network round, shared by every caller that joined it.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
  data: Value,
  source: CacheSource,
  fetched_at: DateTime<Utc>,
  degraded_reason: Option<String>,
}

type InFlight = Shared<BoxFuture<'static, Option<Resolved>>>;

/// Latest state of a cache key as seen by its subscribers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
  pub data: Option<Value>,
  pub source: Option<CacheSource>,
  pub fetched_at: Option<DateTime<Utc>>,
  pub is_fetching: bool,
  pub degraded_reason: Option<String>,
}

struct Subscriber {
  id: u64,
  provides: Vec<Tag>,
  refetch: Refetch,
}

struct Inner {
  storage: Box<dyn CacheStorage>,
  registry: Mutex<TagRegistry>,
  in_flight: Mutex<HashMap<String, (u64, InFlight)>>,
  subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
  channels: Mutex<HashMap<String, watch::Sender<Snapshot>>>,
  sequence: AtomicU64,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// How long an entry without subscribers survives
  keep_unused: Duration,
}

/// Cache layer that manages caching logic and network fetching.
///
/// Reads are cache-first, de-duplicated per key, and fall back to static
/// data when the network fails. Mutations invalidate tags, which marks the
/// providing entries stale and refetches those with live subscribers.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct CacheLayer {
  inner: Arc<Inner>,
}

#[derive(Clone)]
pub(crate) struct WeakCacheLayer(Weak<Inner>);

impl WeakCacheLayer {
  pub(crate) fn upgrade(&self) -> Option<CacheLayer> {
    self.0.upgrade().map(|inner| CacheLayer { inner })
  }
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: impl CacheStorage + 'static, stale_time: Duration, keep_unused: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        storage: Box::new(storage),
        registry: Mutex::new(TagRegistry::new()),
        in_flight: Mutex::new(HashMap::new()),
        subscribers: Mutex::new(HashMap::new()),
        channels: Mutex::new(HashMap::new()),
        sequence: AtomicU64::new(1),
        stale_time,
        keep_unused,
      }),
    }
  }

  /// In-memory cache with default timings.
  pub fn in_memory() -> Self {
    Self::from_config(&CacheConfig::default())
  }

  pub fn from_config(config: &CacheConfig) -> Self {
    if config.enabled {
      Self::new(MemoryStorage::new(), config.stale_time(), config.keep_unused())
    } else {
      Self::new(NoopStorage, config.stale_time(), config.keep_unused())
    }
  }

  pub(crate) fn downgrade(&self) -> WeakCacheLayer {
    WeakCacheLayer(Arc::downgrade(&self.inner))
  }

  /// Check if an entry can be served without a request.
  fn is_fresh(&self, entry: &CacheEntry) -> bool {
    !entry.is_stale && Utc::now() - entry.fetched_at <= self.inner.stale_time
  }

  /// Serve `key` from cache if a fresh entry exists.
  pub(crate) fn cached<T: Cacheable>(&self, key: &QueryKey) -> Option<CacheResult<T>> {
    self.sweep();

    let entry = self.inner.storage.get(key.cache_hash())?;
    if !self.is_fresh(&entry) {
      return None;
    }

    match serde_json::from_value(entry.data) {
      Ok(data) => {
        debug!(query = %key.description(), "cache hit");
        Some(CacheResult::from_cache(
          data,
          entry.fetched_at,
          entry.source,
          entry.degraded_reason,
        ))
      }
      Err(e) => {
        warn!(query = %key.description(), error = %e, "cached entry no longer decodes, refetching");
        None
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network (joining an identical request in flight)
  /// 3. On network failure, substitute fallback data
  /// 4. Store the result and tag it with `provides`
  pub(crate) async fn fetch<T: Cacheable>(
    &self,
    key: &QueryKey,
    provides: &[Tag],
    fetcher: &FetcherFn<T>,
    fallback: &FallbackFn<T>,
  ) -> CacheResult<T> {
    if let Some(hit) = self.cached(key) {
      return hit;
    }

    let Some(resolved) = self.resolve(key, provides, fetcher, fallback).await else {
      warn!(query = %key.description(), "fetch task aborted, serving fallback data");
      return CacheResult::fallback(fallback(), Utc::now(), "fetch task aborted");
    };

    match serde_json::from_value::<T>(resolved.data) {
      Ok(data) => match resolved.source {
        CacheSource::Fallback => CacheResult::fallback(
          data,
          resolved.fetched_at,
          resolved.degraded_reason.unwrap_or_default(),
        ),
        _ => CacheResult::from_network(data, resolved.fetched_at),
      },
      Err(e) => {
        warn!(query = %key.description(), error = %e, "result does not decode, serving fallback data");
        CacheResult::fallback(fallback(), Utc::now(), e.to_string())
      }
    }
  }

  /// Run the network request for `key`, or join the one already in flight.
  ///
  /// The request runs on its own task, so it completes and populates the
  /// cache even if every caller stops waiting for it. `provides` is
  /// registered as soon as the request starts so that an invalidation
  /// arriving mid-flight supersedes it.
  pub(crate) async fn resolve<T: Cacheable>(
    &self,
    key: &QueryKey,
    provides: &[Tag],
    fetcher: &FetcherFn<T>,
    fallback: &FallbackFn<T>,
  ) -> Option<Resolved> {
    let hash = key.cache_hash().to_string();

    let (generation, shared) = {
      let mut in_flight = lock(&self.inner.in_flight);
      match in_flight.get(&hash) {
        Some((generation, existing)) => {
          debug!(query = %key.description(), "joining in-flight request");
          (*generation, existing.clone())
        }
        None => {
          debug!(query = %key.description(), "fetching");
          let generation = self.next_id();
          lock(&self.inner.registry).register(&hash, provides);
          let task = tokio::spawn(self.clone().run_fetch(
            key.clone(),
            generation,
            fetcher.clone(),
            fallback.clone(),
          ));
          let shared: InFlight = async move { task.await.ok() }.boxed().shared();
          in_flight.insert(hash.clone(), (generation, shared.clone()));
          (generation, shared)
        }
      }
    };

    let resolved = shared.await;
    self.finish_in_flight(&hash, generation);
    resolved
  }

  async fn run_fetch<T: Cacheable>(
    self,
    key: QueryKey,
    generation: u64,
    fetcher: FetcherFn<T>,
    fallback: FallbackFn<T>,
  ) -> Resolved {
    self.publish(key.cache_hash(), |snapshot| snapshot.is_fetching = true);

    let outcome = fetcher()
      .await
      .and_then(|data| serde_json::to_value(data).map_err(Report::from));

    let hash = key.cache_hash();
    let resolved = match outcome {
      Ok(data) => Resolved {
        data,
        source: CacheSource::Network,
        fetched_at: Utc::now(),
        degraded_reason: None,
      },
      Err(err) => {
        warn!(query = %key.description(), error = %err, "query failed, serving fallback data");
        Resolved {
          data: serde_json::to_value(fallback()).unwrap_or(Value::Null),
          source: CacheSource::Fallback,
          fetched_at: Utc::now(),
          degraded_reason: Some(err.to_string()),
        }
      }
    };

    // Invalidation or reset removed this request from the in-flight map
    let current = lock(&self.inner.in_flight)
      .get(hash)
      .is_some_and(|(g, _)| *g == generation);
    if current {
      self.store(hash, &resolved);
    } else {
      debug!(query = %key.description(), "request superseded, result not cached");
    }

    self.finish_in_flight(hash, generation);
    self.release_if_unused(hash);
    resolved
  }

  fn finish_in_flight(&self, hash: &str, generation: u64) {
    let mut in_flight = lock(&self.inner.in_flight);
    if in_flight.get(hash).is_some_and(|(g, _)| *g == generation) {
      in_flight.remove(hash);
    }
  }

  fn store(&self, hash: &str, resolved: &Resolved) {
    let subscribed = lock(&self.inner.subscribers)
      .get(hash)
      .is_some_and(|subs| !subs.is_empty());

    self.inner.storage.put(
      hash,
      CacheEntry {
        data: resolved.data.clone(),
        source: resolved.source,
        fetched_at: resolved.fetched_at,
        is_stale: false,
        unused_since: if subscribed {
          None
        } else {
          Some(resolved.fetched_at)
        },
        degraded_reason: resolved.degraded_reason.clone(),
      },
    );

    self.publish(hash, |snapshot| {
      *snapshot = Snapshot {
        data: Some(resolved.data.clone()),
        source: Some(resolved.source),
        fetched_at: Some(resolved.fetched_at),
        is_fetching: false,
        degraded_reason: resolved.degraded_reason.clone(),
      }
    });
  }

  fn publish(&self, hash: &str, modify: impl FnOnce(&mut Snapshot)) {
    if let Some(tx) = lock(&self.inner.channels).get(hash) {
      tx.send_modify(modify);
    }
  }

  /// Drop entries that have had no subscribers for longer than `keep_unused`.
  fn sweep(&self) {
    let cutoff = Utc::now() - self.inner.keep_unused;
    let evicted = self.inner.storage.evict_unused(cutoff);
    if evicted.is_empty() {
      return;
    }

    for key in &evicted {
      self.release_if_unused(key);
    }
    debug!(count = evicted.len(), "evicted unused cache entries");
  }

  /// Drop the tag edges of a key nothing refers to anymore.
  fn release_if_unused(&self, hash: &str) {
    let subscribed = lock(&self.inner.subscribers).contains_key(hash);
    let in_flight = lock(&self.inner.in_flight).contains_key(hash);
    if !subscribed && !in_flight && self.inner.storage.get(hash).is_none() {
      lock(&self.inner.registry).unregister(hash);
    }
  }

  /// Mark every entry providing one of `tags` stale and refetch the ones
  /// with active subscribers (one request per key).
  ///
  /// Requests for those keys that are still in flight were sent before the
  /// mutation: their results are not cached, and refetches start new
  /// requests instead of joining them.
  ///
  /// Returns the number of refetches issued.
  pub async fn invalidate(&self, tags: &[Tag]) -> usize {
    let keys = lock(&self.inner.registry).keys_for_tags(tags);
    if keys.is_empty() {
      return 0;
    }

    let marked = self.inner.storage.mark_stale(&keys);
    let superseded = {
      let mut in_flight = lock(&self.inner.in_flight);
      keys
        .iter()
        .filter(|key| in_flight.remove(key.as_str()).is_some())
        .count()
    };
    let refetches: Vec<Refetch> = {
      let subscribers = lock(&self.inner.subscribers);
      keys
        .iter()
        .filter_map(|key| subscribers.get(key)?.first().map(|s| Arc::clone(&s.refetch)))
        .collect()
    };

    debug!(
      tags = ?tags.iter().map(Tag::as_str).collect::<Vec<_>>(),
      marked,
      superseded,
      refetching = refetches.len(),
      "invalidated cache tags"
    );

    join_all(refetches.iter().map(|refetch| refetch())).await;
    refetches.len()
  }

  /// Run a write operation. On success the `invalidates` tags are
  /// invalidated; on failure the error is returned untouched.
  pub async fn mutate<T, Fut>(&self, operation: &str, invalidates: &[Tag], request: Fut) -> Result<T>
  where
    Fut: Future<Output = Result<T>>,
  {
    match request.await {
      Ok(output) => {
        debug!(operation, "mutation succeeded");
        self.invalidate(invalidates).await;
        Ok(output)
      }
      Err(e) => {
        error!(operation, error = %e, "mutation failed");
        Err(e)
      }
    }
  }

  /// Register a live consumer of `key`. The consumer is refetched on
  /// invalidation of any tag in `provides` until the returned subscription
  /// is dropped.
  pub(crate) fn subscribe(&self, key: &QueryKey, provides: &[Tag], refetch: Refetch) -> Subscription {
    let hash = key.cache_hash().to_string();
    let id = self.next_id();

    lock(&self.inner.subscribers)
      .entry(hash.clone())
      .or_default()
      .push(Subscriber {
        id,
        provides: provides.to_vec(),
        refetch: Arc::clone(&refetch),
      });
    lock(&self.inner.registry).register(&hash, provides);
    self.inner.storage.set_unused_since(&hash, None);

    let entry = self.inner.storage.get(&hash);
    let needs_fetch = entry.as_ref().map_or(true, |e| !self.is_fresh(e));
    let in_flight = lock(&self.inner.in_flight).contains_key(&hash);

    let rx = lock(&self.inner.channels)
      .entry(hash.clone())
      .or_insert_with(|| {
        let mut snapshot = entry
          .as_ref()
          .map(|e| Snapshot {
            data: Some(e.data.clone()),
            source: Some(e.source),
            fetched_at: Some(e.fetched_at),
            is_fetching: false,
            degraded_reason: e.degraded_reason.clone(),
          })
          .unwrap_or_default();
        snapshot.is_fetching = in_flight;
        watch::channel(snapshot).0
      })
      .subscribe();

    if needs_fetch {
      self.publish(&hash, |snapshot| snapshot.is_fetching = true);
      tokio::spawn(refetch());
    }

    Subscription {
      layer: self.downgrade(),
      hash,
      id,
      rx,
    }
  }

  fn unsubscribe(&self, hash: &str, id: u64) {
    let now_unused = {
      let mut subscribers = lock(&self.inner.subscribers);
      match subscribers.get_mut(hash) {
        Some(list) => {
          list.retain(|s| s.id != id);
          let empty = list.is_empty();
          if empty {
            subscribers.remove(hash);
          }
          empty
        }
        None => false,
      }
    };

    if now_unused {
      self.inner.storage.set_unused_since(hash, Some(Utc::now()));
      lock(&self.inner.channels).remove(hash);
      self.release_if_unused(hash);
    }
  }

  /// Number of live subscribers of `key`.
  pub fn subscriber_count(&self, key: &QueryKey) -> usize {
    lock(&self.inner.subscribers)
      .get(key.cache_hash())
      .map_or(0, Vec::len)
  }

  /// Raw entry for `key`, if stored.
  pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
    self.inner.storage.get(key.cache_hash())
  }

  /// Forget every entry and tag edge. Requests in flight are not cached
  /// when they complete. Subscribers see an empty state and stay
  /// registered for invalidation.
  pub fn reset(&self) {
    self.inner.storage.clear();
    lock(&self.inner.in_flight).clear();

    let live: Vec<(String, Vec<Tag>)> = lock(&self.inner.subscribers)
      .iter()
      .filter_map(|(hash, subs)| Some((hash.clone(), subs.first()?.provides.clone())))
      .collect();
    {
      let mut registry = lock(&self.inner.registry);
      registry.clear();
      for (hash, provides) in &live {
        registry.register(hash, provides);
      }
    }

    for tx in lock(&self.inner.channels).values() {
      tx.send_replace(Snapshot::default());
    }
    debug!("cache reset");
  }

  fn next_id(&self) -> u64 {
    self.inner.sequence.fetch_add(1, Ordering::Relaxed)
  }
}

/// A live consumer registration; unregisters on drop.
pub(crate) struct Subscription {
  layer: WeakCacheLayer,
  hash: String,
  id: u64,
  pub(crate) rx: watch::Receiver<Snapshot>,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(layer) = self.layer.upgrade() {
      layer.unsubscribe(&self.hash, self.id);
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::AtomicUsize;

  fn counting_fetcher(calls: Arc<AtomicUsize>, fail: bool) -> FetcherFn<Vec<u32>> {
    Arc::new(move || {
      let calls = calls.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if fail {
          Err(eyre!("connection refused"))
        } else {
          Ok(vec![n, n + 1])
        }
      }
      .boxed()
    })
  }

  fn fallback() -> FallbackFn<Vec<u32>> {
    Arc::new(|| vec![99])
  }

  fn layer(stale_secs: i64, keep_unused_secs: i64) -> CacheLayer {
    CacheLayer::new(
      MemoryStorage::new(),
      Duration::seconds(stale_secs),
      Duration::seconds(keep_unused_secs),
    )
  }

  fn key() -> QueryKey {
    QueryKey::new("getNumbers", &serde_json::json!({ "page": 1 }))
  }

  #[tokio::test]
  async fn test_second_read_is_served_from_cache() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);

    let first = cache.fetch(&key(), &[Tag::new("N")], &fetcher, &fallback()).await;
    let second = cache.fetch(&key(), &[Tag::new("N")], &fetcher, &fallback()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(first.data, second.data);
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let fb = fallback();
    let k = key();

    let (a, b, c) = tokio::join!(
      cache.fetch(&k, &[], &fetcher, &fb),
      cache.fetch(&k, &[], &fetcher, &fb),
      cache.fetch(&k, &[], &fetcher, &fb),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, vec![0, 1]);
    assert_eq!(b.data, a.data);
    assert_eq!(c.data, a.data);
  }

  #[tokio::test]
  async fn test_failure_serves_fallback_and_caches_it() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), true);

    let result = cache.fetch(&key(), &[], &fetcher, &fallback()).await;
    assert_eq!(result.data, vec![99]);
    assert!(result.is_degraded());
    assert!(result
      .degraded_reason
      .as_deref()
      .is_some_and(|r| r.contains("connection refused")));

    // The fallback result is cached but still flagged as degraded
    let again = cache.fetch(&key(), &[], &fetcher, &fallback()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(again.is_degraded());
    assert_eq!(again.degraded_reason, result.degraded_reason);
  }

  #[tokio::test]
  async fn test_invalidation_makes_next_read_refetch() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let tags = [Tag::list("Numbers")];

    cache.fetch(&key(), &tags, &fetcher, &fallback()).await;

    // No subscribers: entries are only marked stale
    assert_eq!(cache.invalidate(&[Tag::list("Other")]).await, 0);
    assert_eq!(cache.invalidate(&tags).await, 0);
    assert!(cache.entry(&key()).unwrap().is_stale);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let result = cache.fetch(&key(), &tags, &fetcher, &fallback()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.source, CacheSource::Network);
    assert!(!cache.entry(&key()).unwrap().is_stale);
  }

  #[tokio::test]
  async fn test_entries_expire_after_stale_time() {
    let cache = layer(0, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);

    cache.fetch(&key(), &[], &fetcher, &fallback()).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    cache.fetch(&key(), &[], &fetcher, &fallback()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_unused_entries_are_evicted() {
    let cache = layer(300, 0);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let tags = [Tag::new("N")];

    cache.fetch(&key(), &tags, &fetcher, &fallback()).await;
    assert!(cache.entry(&key()).is_some());

    cache.fetch(&key(), &tags, &fetcher, &fallback()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_mutation_failure_does_not_invalidate() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let tags = [Tag::list("Numbers")];
    cache.fetch(&key(), &tags, &fetcher, &fallback()).await;

    let err = cache
      .mutate::<(), _>("createNumber", &tags, async { Err(eyre!("HTTP 422")) })
      .await
      .unwrap_err();
    assert!(err.to_string().contains("422"));
    assert!(!cache.entry(&key()).unwrap().is_stale);

    let out = cache
      .mutate("createNumber", &tags, async { Ok::<_, Report>(7) })
      .await
      .unwrap();
    assert_eq!(out, 7);
    assert!(cache.entry(&key()).unwrap().is_stale);
  }

  #[tokio::test]
  async fn test_disabled_storage_still_dedupes() {
    let cache = CacheLayer::new(NoopStorage, Duration::seconds(300), Duration::seconds(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let fb = fallback();
    let k = key();

    tokio::join!(cache.fetch(&k, &[], &fetcher, &fb), cache.fetch(&k, &[], &fetcher, &fb));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.fetch(&k, &[], &fetcher, &fb).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_reset_forgets_everything() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    cache.fetch(&key(), &[Tag::new("N")], &fetcher, &fallback()).await;

    cache.reset();

    assert!(cache.entry(&key()).is_none());
    assert_eq!(cache.invalidate(&[Tag::new("N")]).await, 0);
  }

  #[tokio::test]
  async fn test_invalidation_mid_flight_discards_old_response() {
    let cache = layer(300, 60);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let fb = fallback();
    let tags = [Tag::list("Numbers")];

    let k = key();
    let (first, refetched) = tokio::join!(cache.fetch(&k, &tags, &fetcher, &fb), async {
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
      cache.invalidate(&tags).await
    });

    // The caller still gets its answer, but it is not cached
    assert_eq!(refetched, 0);
    assert_eq!(first.data, vec![0, 1]);
    assert!(cache.entry(&key()).is_none());

    let second = cache.fetch(&key(), &tags, &fetcher, &fb).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.source, CacheSource::Network);
    assert_eq!(second.data, vec![1, 2]);
  }

  #[tokio::test]
  async fn test_disabled_storage_releases_tags_of_unsubscribed_keys() {
    let cache = CacheLayer::new(NoopStorage, Duration::seconds(300), Duration::seconds(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), false);
    let tags = vec![Tag::list("Numbers")];

    let weak = cache.downgrade();
    let refetch: Refetch = {
      let tags = tags.clone();
      Arc::new(move || {
        let weak = weak.clone();
        let tags = tags.clone();
        let fetcher = fetcher.clone();
        async move {
          if let Some(cache) = weak.upgrade() {
            cache.resolve(&key(), &tags, &fetcher, &fallback()).await;
          }
        }
        .boxed()
      })
    };

    let subscription = cache.subscribe(&key(), &tags, refetch);
    assert_eq!(
      lock(&cache.inner.registry).tags_for_key(key().cache_hash()).len(),
      1
    );
    tokio::time::sleep(std::time::Duration::from_millis(40)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Still subscribed: invalidation reaches it even though nothing is stored
    assert_eq!(cache.invalidate(&tags).await, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    drop(subscription);
    assert!(lock(&cache.inner.registry)
      .tags_for_key(key().cache_hash())
      .is_empty());
    assert_eq!(cache.invalidate(&tags).await, 0);
  }

  #[tokio::test]
  async fn test_reset_keeps_live_subscribers_registered() {
    let cache = layer(300, 60);
    let tags = vec![Tag::list("Numbers")];
    let refetch: Refetch = Arc::new(|| async {}.boxed());

    let _subscription = cache.subscribe(&key(), &tags, refetch);
    cache.reset();

    assert_eq!(cache.invalidate(&tags).await, 1);
  }
}
