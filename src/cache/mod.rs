//! Query result caching with tag-based invalidation.
//!
//! This module provides the machinery behind every resource client:
//! - Caches query results keyed by operation + normalized parameters
//! - Coalesces identical concurrent requests into one
//! - Substitutes fallback data when a read fails
//! - Marks results stale when a mutation invalidates a tag they provide,
//!   refetching the ones that still have subscribers

mod keys;
mod layer;
mod registry;
mod storage;
mod traits;

pub use keys::{QueryKey, Tag};
pub use layer::{CacheLayer, FallbackFn, FetcherFn};
pub(crate) use layer::{Refetch, Snapshot, Subscription};
pub use registry::{affected_keys, TagRegistry};
pub use storage::{CacheEntry, CacheStorage, MemoryStorage, NoopStorage};
pub use traits::{CacheResult, CacheSource, Cacheable};
