use crate::api::staff::{StaffListParams, StaffMember};
use crate::api::types::{AccountStatus, Paginated};

use super::{at, matches_search, page_of};

fn staff() -> Vec<StaffMember> {
  let member = |id: u64, first: &str, last: &str, role: &str, department: &str, subjects: &[&str]| {
    StaffMember {
      id,
      first_name: first.to_string(),
      last_name: last.to_string(),
      email: format!(
        "{}.{}@demo-school.ng",
        first.to_lowercase(),
        last.to_lowercase()
      ),
      role: role.to_string(),
      department: Some(department.to_string()),
      subjects: subjects.iter().map(|s| s.to_string()).collect(),
      status: AccountStatus::Active,
      phone: None,
      joined_at: at(2023, 1, 16),
    }
  };

  vec![
    member(1, "Ngozi", "Eze", "teacher", "Sciences", &["Physics", "Chemistry"]),
    member(2, "Ibrahim", "Musa", "teacher", "Sciences", &["Mathematics"]),
    member(3, "Yetunde", "Alabi", "teacher", "Arts", &["English", "Literature"]),
    member(4, "Segun", "Ogunleye", "coordinator", "Examinations", &[]),
    member(5, "Halima", "Bello", "administrator", "Administration", &[]),
  ]
}

pub fn list(params: &StaffListParams) -> Paginated<StaffMember> {
  let items = staff()
    .into_iter()
    .filter(|m| params.status.map_or(true, |status| m.status == status))
    .filter(|m| {
      params
        .department
        .as_deref()
        .map_or(true, |d| m.department.as_deref() == Some(d))
    })
    .filter(|m| {
      matches_search(
        params.search.as_deref(),
        &[m.first_name.as_str(), m.last_name.as_str(), m.email.as_str()],
      )
    })
    .collect();
  page_of(items, params.page, params.limit)
}

pub fn detail(id: u64) -> StaffMember {
  let all = staff();
  let mut member = all
    .iter()
    .find(|m| m.id == id)
    .unwrap_or(&all[0])
    .clone();
  member.id = id;
  member
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_detail_for_unknown_id() {
    let member = detail(7);
    assert_eq!(member.id, 7);
    assert_eq!(member.first_name, "Ngozi");
  }

  #[test]
  fn test_list_by_department() {
    let sciences = list(&StaffListParams {
      department: Some("Sciences".into()),
      ..Default::default()
    });
    assert_eq!(sciences.total, 2);
    assert_eq!(sciences.limit, 10);
  }
}
