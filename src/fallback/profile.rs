use crate::api::auth::Profile;

/// Used when neither the backend nor the session knows who is signed in.
pub fn profile() -> Profile {
  Profile {
    id: "0".to_string(),
    name: "Demo Admin".to_string(),
    email: "admin@demo-school.ng".to_string(),
    role: "admin".to_string(),
    institution: Some("Demo School".to_string()),
    phone: None,
  }
}
