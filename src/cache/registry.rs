//! Tag registry: the bipartite graph between tags and cached query keys.

use std::collections::{HashMap, HashSet};

use super::keys::Tag;

/// Tracks tag → cache keys and cache key → tags mappings.
#[derive(Debug, Default)]
pub struct TagRegistry {
  /// Maps tags to all cache keys that provide them
  tag_to_keys: HashMap<Tag, HashSet<String>>,
  /// Maps cache keys to the tags they provide
  key_to_tags: HashMap<String, HashSet<Tag>>,
}

impl TagRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record that `cache_key` provides `tags`, replacing any previous set.
  pub fn register(&mut self, cache_key: &str, tags: &[Tag]) {
    self.unregister(cache_key);

    for tag in tags {
      self
        .tag_to_keys
        .entry(tag.clone())
        .or_default()
        .insert(cache_key.to_string());
    }
    self
      .key_to_tags
      .insert(cache_key.to_string(), tags.iter().cloned().collect());
  }

  /// Remove a cache key and clean up tag mappings.
  pub fn unregister(&mut self, cache_key: &str) {
    if let Some(tags) = self.key_to_tags.remove(cache_key) {
      for tag in tags {
        if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
          keys.remove(cache_key);
          if keys.is_empty() {
            self.tag_to_keys.remove(&tag);
          }
        }
      }
    }
  }

  /// All cache keys providing at least one of `tags`.
  pub fn keys_for_tags(&self, tags: &[Tag]) -> HashSet<String> {
    affected_keys(&self.tag_to_keys, tags)
  }

  pub fn tags_for_key(&self, cache_key: &str) -> HashSet<Tag> {
    self.key_to_tags.get(cache_key).cloned().unwrap_or_default()
  }

  pub fn clear(&mut self) {
    self.tag_to_keys.clear();
    self.key_to_tags.clear();
  }
}

/// Keys providing at least one tag in `invalidates`.
pub fn affected_keys(
  tag_to_keys: &HashMap<Tag, HashSet<String>>,
  invalidates: &[Tag],
) -> HashSet<String> {
  invalidates
    .iter()
    .filter_map(|tag| tag_to_keys.get(tag))
    .flatten()
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_invalidation_is_set_intersection() {
    let mut registry = TagRegistry::new();
    registry.register("list-p1", &[Tag::list("Students")]);
    registry.register("list-p2", &[Tag::list("Students")]);
    registry.register("detail-7", &[Tag::detail("Student", 7)]);
    registry.register("staff", &[Tag::list("Staff")]);

    assert_eq!(
      registry.keys_for_tags(&[Tag::list("Students")]),
      keys(&["list-p1", "list-p2"])
    );
    assert_eq!(
      registry.keys_for_tags(&[Tag::list("Students"), Tag::detail("Student", 7)]),
      keys(&["list-p1", "list-p2", "detail-7"])
    );
    assert!(registry.keys_for_tags(&[Tag::detail("Student", 8)]).is_empty());
    assert!(registry.keys_for_tags(&[]).is_empty());
  }

  #[test]
  fn test_register_replaces_previous_tags() {
    let mut registry = TagRegistry::new();
    registry.register("k", &[Tag::new("A")]);
    registry.register("k", &[Tag::new("B")]);

    assert!(registry.keys_for_tags(&[Tag::new("A")]).is_empty());
    assert_eq!(registry.keys_for_tags(&[Tag::new("B")]), keys(&["k"]));
    assert_eq!(registry.tags_for_key("k").len(), 1);
  }

  #[test]
  fn test_unregister_cleans_up() {
    let mut registry = TagRegistry::new();
    registry.register("k", &[Tag::new("A"), Tag::new("B")]);
    registry.unregister("k");

    assert!(registry.keys_for_tags(&[Tag::new("A"), Tag::new("B")]).is_empty());
    assert!(registry.tag_to_keys.is_empty());
    assert!(registry.key_to_tags.is_empty());
  }
}
