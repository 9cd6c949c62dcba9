//! Hook-like query handles over the cache layer.
//!
//! Inspired by TanStack Query: every read operation of a resource client
//! returns a [`Query<T>`], which can be awaited once or watched.
//!
//! # Example
//!
//! ```ignore
//! let query = app.students().list(StudentListParams::page(1, 10));
//!
//! // One-shot read
//! let result = query.fetch().await;
//! if result.is_degraded() {
//!     // backend unreachable, `result.data` is fallback data
//! }
//!
//! // Live subscription, refetched whenever a mutation invalidates it
//! let mut observer = query.watch(QueryOptions::default());
//! while observer.changed().await {
//!     let state = observer.state();
//!     if state.is_loading { /* spinner */ }
//!     if let Some(page) = state.data { /* render */ }
//! }
//! ```

use color_eyre::Result;
use futures::future::FutureExt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::{
  CacheLayer, CacheResult, CacheSource, Cacheable, FallbackFn, FetcherFn, QueryKey, Refetch,
  Snapshot, Subscription, Tag,
};

/// Per-consumer query options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
  /// Do not issue the query at all (e.g. for a hidden tab)
  pub skip: bool,
}

impl QueryOptions {
  pub fn skip(skip: bool) -> Self {
    Self { skip }
  }
}

/// What a consumer sees of a query at one point in time.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
  pub data: Option<T>,
  /// No data yet and a request is running
  pub is_loading: bool,
  /// A request is running (possibly while older data is shown)
  pub is_fetching: bool,
  /// Set only when stored data cannot be decoded; network failures are
  /// reported through `source` instead
  pub error: Option<String>,
  pub source: Option<CacheSource>,
  /// Why the backend could not be used, when `data` is fallback data
  pub degraded_reason: Option<String>,
}

impl<T> QueryState<T> {
  fn idle() -> Self {
    Self {
      data: None,
      is_loading: false,
      is_fetching: false,
      error: None,
      source: None,
      degraded_reason: None,
    }
  }

  /// True when `data` is fallback data.
  pub fn is_degraded(&self) -> bool {
    self.source == Some(CacheSource::Fallback)
  }

  pub fn is_idle(&self) -> bool {
    self.data.is_none() && !self.is_fetching && self.error.is_none()
  }
}

/// A declared read: operation key, the tags it provides, how to fetch it,
/// and what to serve when fetching fails.
pub struct Query<T> {
  cache: CacheLayer,
  key: QueryKey,
  provides: Vec<Tag>,
  fetcher: FetcherFn<T>,
  fallback: FallbackFn<T>,
}

impl<T: Cacheable> Query<T> {
  pub(crate) fn new<F, Fut, G>(
    cache: CacheLayer,
    key: QueryKey,
    provides: Vec<Tag>,
    fetcher: F,
    fallback: G,
  ) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    G: Fn() -> T + Send + Sync + 'static,
  {
    Self {
      cache,
      key,
      provides,
      fetcher: Arc::new(move || fetcher().boxed()),
      fallback: Arc::new(fallback),
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn provides(&self) -> &[Tag] {
    &self.provides
  }

  /// Read once. Never fails: network errors yield fallback data.
  pub async fn fetch(&self) -> CacheResult<T> {
    self
      .cache
      .fetch(&self.key, &self.provides, &self.fetcher, &self.fallback)
      .await
  }

  /// Read once unless `options.skip` is set.
  pub async fn fetch_with(&self, options: QueryOptions) -> Option<CacheResult<T>> {
    if options.skip {
      return None;
    }
    Some(self.fetch().await)
  }

  /// Subscribe to this query. The first subscriber of a missing or stale
  /// key triggers a request; invalidation of any provided tag refetches it
  /// for as long as the observer lives.
  pub fn watch(&self, options: QueryOptions) -> QueryObserver<T> {
    if options.skip {
      return QueryObserver {
        subscription: None,
        refetch: None,
        _marker: PhantomData,
      };
    }

    let refetch = self.refetcher();
    let subscription = self
      .cache
      .subscribe(&self.key, &self.provides, Arc::clone(&refetch));
    QueryObserver {
      subscription: Some(subscription),
      refetch: Some(refetch),
      _marker: PhantomData,
    }
  }

  fn refetcher(&self) -> Refetch {
    let cache = self.cache.downgrade();
    let key = self.key.clone();
    let provides = self.provides.clone();
    let fetcher = self.fetcher.clone();
    let fallback = self.fallback.clone();

    Arc::new(move || {
      let cache = cache.clone();
      let key = key.clone();
      let provides = provides.clone();
      let fetcher = fetcher.clone();
      let fallback = fallback.clone();
      async move {
        if let Some(cache) = cache.upgrade() {
          cache.resolve(&key, &provides, &fetcher, &fallback).await;
        }
      }
      .boxed()
    })
  }
}

/// A live subscription to a query. Dropping it unsubscribes; a request
/// already running is not cancelled, its result just lands in the cache.
pub struct QueryObserver<T> {
  subscription: Option<Subscription>,
  refetch: Option<Refetch>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Cacheable> QueryObserver<T> {
  /// Current state of the query.
  pub fn state(&self) -> QueryState<T> {
    match &self.subscription {
      Some(subscription) => to_state(&subscription.rx.borrow()),
      None => QueryState::idle(),
    }
  }

  /// Wait for the next state change. Returns false once no further
  /// changes can arrive (skipped query, or the cache was dropped).
  pub async fn changed(&mut self) -> bool {
    match &mut self.subscription {
      Some(subscription) => subscription.rx.changed().await.is_ok(),
      None => false,
    }
  }

  /// Wait until the query holds data that is not being refetched.
  pub async fn settled(&mut self) -> QueryState<T> {
    loop {
      let state = self.state();
      if (state.data.is_some() || state.error.is_some()) && !state.is_fetching {
        return state;
      }
      if !self.changed().await {
        return self.state();
      }
    }
  }

  /// Force a request, ignoring freshness.
  pub async fn refetch(&self) {
    if let Some(refetch) = &self.refetch {
      refetch().await;
    }
  }

  pub fn is_skipped(&self) -> bool {
    self.subscription.is_none()
  }
}

fn to_state<T: Cacheable>(snapshot: &Snapshot) -> QueryState<T> {
  let (data, error) = match &snapshot.data {
    Some(value) => match serde_json::from_value::<T>(value.clone()) {
      Ok(data) => (Some(data), None),
      Err(e) => (None, Some(format!("Failed to decode cached result: {}", e))),
    },
    None => (None, None),
  };

  QueryState {
    is_loading: data.is_none() && snapshot.is_fetching,
    is_fetching: snapshot.is_fetching,
    data,
    error,
    source: snapshot.source,
    degraded_reason: snapshot.degraded_reason.clone(),
  }
}
