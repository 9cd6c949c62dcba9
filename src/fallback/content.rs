use crate::api::content::{ContentItem, ContentListParams, ContentStatus};
use crate::api::types::Paginated;

use super::{at, matches_search, page_of};

fn content() -> Vec<ContentItem> {
  let item = |id: u64, title: &str, kind: &str, subject: &str, status, questions: u32| ContentItem {
    id,
    title: title.to_string(),
    kind: kind.to_string(),
    subject: subject.to_string(),
    status,
    author: Some("Demo Editor".to_string()),
    body: None,
    question_count: Some(questions),
    updated_at: at(2025, 2, 3),
  };

  vec![
    item(1, "JAMB Mathematics Past Questions", "question-bank", "Mathematics", ContentStatus::Published, 120),
    item(2, "WAEC Physics 2019", "question-bank", "Physics", ContentStatus::Published, 60),
    item(3, "Comprehension: The River Niger", "passage", "English", ContentStatus::Published, 10),
    item(4, "Organic Chemistry Drill", "question-bank", "Chemistry", ContentStatus::Draft, 40),
    item(5, "Literature Set Texts 2025", "passage", "Literature", ContentStatus::Archived, 0),
  ]
}

pub fn list(params: &ContentListParams) -> Paginated<ContentItem> {
  let items = content()
    .into_iter()
    .filter(|c| params.status.map_or(true, |status| c.status == status))
    .filter(|c| params.subject.as_deref().map_or(true, |s| c.subject == s))
    .filter(|c| params.kind.as_deref().map_or(true, |k| c.kind == k))
    .filter(|c| matches_search(params.search.as_deref(), &[c.title.as_str()]))
    .collect();
  page_of(items, params.page, params.limit)
}

pub fn detail(id: u64) -> ContentItem {
  let all = content();
  let mut item = all
    .iter()
    .find(|c| c.id == id)
    .unwrap_or(&all[0])
    .clone();
  item.id = id;
  item
}
