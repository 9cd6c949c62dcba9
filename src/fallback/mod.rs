//! Static stand-in data served when a read cannot reach the backend.
//!
//! Every dataset has exactly the type of the live endpoint it replaces, so
//! consumers handle network and fallback data the same way. List datasets
//! honour the request's paging and filters; detail lookups return the
//! dataset's record for the id, or its first record relabelled with the
//! requested id.

pub mod analytics;
pub mod content;
pub mod features;
pub mod payments;
pub mod profile;
pub mod settings;
pub mod staff;
pub mod students;
pub mod users;

use chrono::{DateTime, TimeZone, Utc};

use crate::api::types::{page_and_limit, Paginated};

fn at(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
  Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).single()
}

/// Case-insensitive substring match against any of `fields`.
fn matches_search(search: Option<&str>, fields: &[&str]) -> bool {
  match search.map(str::trim) {
    None | Some("") => true,
    Some(needle) => {
      let needle = needle.to_lowercase();
      fields.iter().any(|f| f.to_lowercase().contains(&needle))
    }
  }
}

fn page_of<T: Clone>(items: Vec<T>, page: Option<u32>, limit: Option<u32>) -> Paginated<T> {
  let (page, limit) = page_and_limit(page, limit);
  Paginated::paginate(&items, page, limit)
}
