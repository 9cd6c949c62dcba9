use crate::api::students::{
  Student, StudentListParams, StudentPerformance, SubjectScore, TestAttempt,
};
use crate::api::types::{AccountStatus, Paginated};

use super::{at, matches_search, page_of};

fn students() -> Vec<Student> {
  let student = |id: u64, first: &str, last: &str, class: &str, status, score: f64| Student {
    id,
    first_name: first.to_string(),
    last_name: last.to_string(),
    email: format!(
      "{}.{}@demo-school.ng",
      first.to_lowercase(),
      last.to_lowercase()
    ),
    phone: None,
    class_level: Some(class.to_string()),
    status,
    subjects: vec![
      "Mathematics".to_string(),
      "English".to_string(),
      "Physics".to_string(),
    ],
    average_score: Some(score),
    guardian_name: None,
    enrolled_at: at(2024, 9, 9),
  };

  vec![
    student(1, "Chidi", "Okafor", "SS3", AccountStatus::Active, 72.5),
    student(2, "Amaka", "Nwosu", "SS3", AccountStatus::Active, 81.0),
    student(3, "Tunde", "Bakare", "SS2", AccountStatus::Active, 64.0),
    student(4, "Zainab", "Usman", "SS2", AccountStatus::Inactive, 58.5),
    student(5, "Emeka", "Obi", "SS1", AccountStatus::Active, 69.0),
    student(6, "Funke", "Adeyemi", "SS1", AccountStatus::Suspended, 47.0),
  ]
}

pub fn list(params: &StudentListParams) -> Paginated<Student> {
  let items = students()
    .into_iter()
    .filter(|s| params.status.map_or(true, |status| s.status == status))
    .filter(|s| {
      params
        .class_level
        .as_deref()
        .map_or(true, |class| s.class_level.as_deref() == Some(class))
    })
    .filter(|s| {
      matches_search(
        params.search.as_deref(),
        &[s.first_name.as_str(), s.last_name.as_str(), s.email.as_str()],
      )
    })
    .collect();
  page_of(items, params.page, params.limit)
}

pub fn detail(id: u64) -> Student {
  let all = students();
  let mut student = all
    .iter()
    .find(|s| s.id == id)
    .unwrap_or(&all[0])
    .clone();
  student.id = id;
  student
}

pub fn performance(id: u64) -> StudentPerformance {
  StudentPerformance {
    student_id: id,
    average_score: 72.5,
    tests_taken: 18,
    subjects: vec![
      SubjectScore {
        subject: "Mathematics".to_string(),
        average_score: 78.0,
        tests_taken: 7,
      },
      SubjectScore {
        subject: "English".to_string(),
        average_score: 70.5,
        tests_taken: 6,
      },
      SubjectScore {
        subject: "Physics".to_string(),
        average_score: 67.0,
        tests_taken: 5,
      },
    ],
    recent_attempts: at(2025, 3, 14)
      .map(|taken_at| TestAttempt {
        test: "JAMB Mock 3".to_string(),
        subject: "Mathematics".to_string(),
        score: 82.0,
        taken_at,
      })
      .into_iter()
      .collect(),
  }
}
