//! Client core of the CBT enterprise admin dashboard.
//!
//! - [`cache`]: query cache with tag invalidation, request coalescing and
//!   subscriber-counted eviction
//! - [`query`]: watchable query handles over the cache
//! - [`api`]: one REST client per resource domain
//! - [`fallback`]: static data served when reads fail
//! - [`session`]: token store and background token refresh
//! - [`app`]: wires everything together from a [`config::Config`]

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod fallback;
pub mod logging;
pub mod query;
pub mod session;

#[cfg(test)]
mod test_support;

pub use app::App;
