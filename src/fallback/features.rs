use crate::api::features::FeatureFlag;

use super::at;

pub fn list() -> Vec<FeatureFlag> {
  let flag = |key: &str, name: &str, description: &str, enabled: bool| FeatureFlag {
    key: key.to_string(),
    name: name.to_string(),
    description: Some(description.to_string()),
    enabled,
    updated_at: at(2024, 11, 4),
  };

  vec![
    flag("proctoring", "Proctoring", "Webcam monitoring during timed tests", true),
    flag("question-shuffle", "Question shuffle", "Randomise question order per candidate", true),
    flag("offline-mode", "Offline mode", "Let candidates sit tests without connectivity", false),
    flag("parent-portal", "Parent portal", "Guardians can view results", false),
  ]
}

/// Unknown keys fall back to a disabled flag of that key.
pub fn detail(key: &str) -> FeatureFlag {
  list()
    .into_iter()
    .find(|f| f.key == key)
    .unwrap_or_else(|| FeatureFlag {
      key: key.to_string(),
      name: key.to_string(),
      description: None,
      enabled: false,
      updated_at: None,
    })
}
