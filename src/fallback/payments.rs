use crate::api::payments::{
  MethodTotal, Payment, PaymentListParams, PaymentStatus, PaymentSummary,
};
use crate::api::types::Paginated;

use super::{at, matches_search, page_of};

fn payments() -> Vec<Payment> {
  let payment = |id: u64, student_id: u64, name: &str, amount: f64, method: &str, status| Payment {
    id,
    student_id,
    student_name: Some(name.to_string()),
    amount,
    currency: "NGN".to_string(),
    method: method.to_string(),
    status,
    reference: Some(format!("DEMO-{:05}", id)),
    description: Some("Term subscription".to_string()),
    paid_at: at(2025, 1, 10),
  };

  vec![
    payment(1, 1, "Chidi Okafor", 25000.0, "card", PaymentStatus::Completed),
    payment(2, 2, "Amaka Nwosu", 25000.0, "transfer", PaymentStatus::Completed),
    payment(3, 3, "Tunde Bakare", 15000.0, "card", PaymentStatus::Pending),
    payment(4, 4, "Zainab Usman", 25000.0, "card", PaymentStatus::Refunded),
    payment(5, 5, "Emeka Obi", 10000.0, "ussd", PaymentStatus::Failed),
  ]
}

pub fn list(params: &PaymentListParams) -> Paginated<Payment> {
  let items = payments()
    .into_iter()
    .filter(|p| params.status.map_or(true, |status| p.status == status))
    .filter(|p| params.student_id.map_or(true, |id| p.student_id == id))
    .filter(|p| {
      matches_search(
        params.search.as_deref(),
        &[
          p.student_name.as_deref().unwrap_or_default(),
          p.reference.as_deref().unwrap_or_default(),
        ],
      )
    })
    .collect();
  page_of(items, params.page, params.limit)
}

pub fn detail(id: u64) -> Payment {
  let all = payments();
  let mut payment = all
    .iter()
    .find(|p| p.id == id)
    .unwrap_or(&all[0])
    .clone();
  payment.id = id;
  payment
}

pub fn summary() -> PaymentSummary {
  PaymentSummary {
    currency: "NGN".to_string(),
    total_revenue: 50000.0,
    total_refunded: 25000.0,
    pending_amount: 15000.0,
    completed_count: 2,
    by_method: vec![
      MethodTotal {
        method: "card".to_string(),
        amount: 25000.0,
        count: 1,
      },
      MethodTotal {
        method: "transfer".to_string(),
        amount: 25000.0,
        count: 1,
      },
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_summary_agrees_with_dataset() {
    let completed: Vec<Payment> = payments()
      .into_iter()
      .filter(|p| p.status == PaymentStatus::Completed)
      .collect();
    let summary = summary();
    assert_eq!(summary.completed_count as usize, completed.len());
    assert_eq!(
      summary.total_revenue,
      completed.iter().map(|p| p.amount).sum::<f64>()
    );
  }

  #[test]
  fn test_list_by_status() {
    let pending = list(&PaymentListParams {
      status: Some(PaymentStatus::Pending),
      ..Default::default()
    });
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].student_id, 3);
  }

  #[test]
  fn test_list_by_search() {
    let by_name = list(&PaymentListParams {
      search: Some("zainab".to_string()),
      ..Default::default()
    });
    assert_eq!(by_name.items.len(), 1);
    assert_eq!(by_name.items[0].id, 4);

    let by_reference = list(&PaymentListParams {
      search: Some("demo-00002".to_string()),
      ..Default::default()
    });
    assert_eq!(by_reference.items.len(), 1);
    assert_eq!(by_reference.items[0].id, 2);
  }
}
