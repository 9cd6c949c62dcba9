//! REST clients for the enterprise backend, one per resource domain.
//!
//! Reads return [`Query`](crate::query::Query) handles that cache, tag and
//! fall back; writes go through [`CacheLayer::mutate`](crate::cache::CacheLayer::mutate)
//! and invalidate the tags they declare.

pub mod analytics;
pub mod auth;
mod client;
pub mod content;
pub mod features;
pub mod payments;
pub mod settings;
pub mod staff;
pub mod students;
pub mod types;
pub mod users;

pub use analytics::AnalyticsApi;
pub use auth::AuthApi;
pub use client::ApiClient;
pub use content::ContentApi;
pub use features::FeaturesApi;
pub use payments::PaymentsApi;
pub use settings::SettingsApi;
pub use staff::StaffApi;
pub use students::StudentsApi;
pub use users::UsersApi;
