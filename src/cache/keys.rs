//! Cache keys and invalidation tags.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Label connecting queries to the mutations that invalidate them,
/// e.g. `Students:LIST` or `StudentDetail:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
  pub fn new(label: impl Into<String>) -> Self {
    Self(label.into())
  }

  /// List-level tag: `{resource}:LIST`
  pub fn list(resource: &str) -> Self {
    Self(format!("{}:LIST", resource))
  }

  /// Detail-level tag: `{resource}Detail:{id}`
  pub fn detail(resource: &str, id: impl fmt::Display) -> Self {
    Self(format!("{}Detail:{}", resource, id))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Identity of a query result: the operation plus its normalized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  operation: &'static str,
  params: String,
  hash: String,
}

impl QueryKey {
  /// Build a key from an operation name and its parameters.
  ///
  /// Parameters that differ only in key order, nulls, empty strings or
  /// surrounding whitespace produce the same key.
  pub fn new<P: Serialize + ?Sized>(operation: &'static str, params: &P) -> Self {
    let params = serde_json::to_value(params)
      .map(normalize)
      .unwrap_or(Value::Null)
      .to_string();

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(params.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Self {
      operation,
      params,
      hash,
    }
  }

  /// Key for an operation without parameters.
  pub fn bare(operation: &'static str) -> Self {
    Self::new(operation, &Value::Null)
  }

  pub fn cache_hash(&self) -> &str {
    &self.hash
  }

  pub fn operation(&self) -> &'static str {
    self.operation
  }

  pub fn description(&self) -> String {
    if self.params == "null" || self.params == "{}" {
      self.operation.to_string()
    } else {
      format!("{} {}", self.operation, self.params)
    }
  }
}

/// Canonicalize parameters. serde_json maps are already key-ordered.
fn normalize(value: Value) -> Value {
  match value {
    Value::Object(map) => Value::Object(
      map
        .into_iter()
        .map(|(k, v)| (k, normalize(v)))
        .filter(|(_, v)| !is_blank(v))
        .collect(),
    ),
    Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
    Value::String(s) => Value::String(s.trim().to_string()),
    other => other,
  }
}

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    _ => false,
  }
}
