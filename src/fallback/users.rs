use crate::api::types::{AccountStatus, Paginated};
use crate::api::users::{AdminUser, UserListParams};

use super::{at, matches_search, page_of};

fn users() -> Vec<AdminUser> {
  let user = |id: u64, name: &str, email: &str, role: &str, status| AdminUser {
    id,
    name: name.to_string(),
    email: email.to_string(),
    role: role.to_string(),
    status,
    last_login_at: at(2025, 3, 17),
    invited_at: at(2024, 8, 1),
  };

  vec![
    user(1, "Demo Admin", "admin@demo-school.ng", "admin", AccountStatus::Active),
    user(2, "Content Editor", "editor@demo-school.ng", "editor", AccountStatus::Active),
    user(3, "Finance Officer", "finance@demo-school.ng", "finance", AccountStatus::Active),
    user(4, "Read Only", "viewer@demo-school.ng", "viewer", AccountStatus::Inactive),
  ]
}

pub fn list(params: &UserListParams) -> Paginated<AdminUser> {
  let items = users()
    .into_iter()
    .filter(|u| params.status.map_or(true, |status| u.status == status))
    .filter(|u| params.role.as_deref().map_or(true, |role| u.role == role))
    .filter(|u| matches_search(params.search.as_deref(), &[u.name.as_str(), u.email.as_str()]))
    .collect();
  page_of(items, params.page, params.limit)
}

pub fn detail(id: u64) -> AdminUser {
  let all = users();
  let mut user = all
    .iter()
    .find(|u| u.id == id)
    .unwrap_or(&all[0])
    .clone();
  user.id = id;
  user
}
