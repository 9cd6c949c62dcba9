use chrono::{Duration, NaiveDate};

use crate::api::analytics::{Overview, Period, SubjectPerformance, Trends, TrendPoint};

pub fn overview(period: Period) -> Overview {
  let days = period.days() as f64;
  Overview {
    period,
    total_students: 420,
    active_students: 312,
    total_staff: 25,
    tests_taken: (40.0 * days) as u64,
    average_score: 66.4,
    revenue: (8500.0 * days).round(),
  }
}

/// Daily points for a week, weekly points for a month or quarter, monthly
/// points for a year.
pub fn trends(period: Period) -> Trends {
  let (buckets, step_days) = match period {
    Period::Week => (7, 1),
    Period::Month => (4, 7),
    Period::Quarter => (13, 7),
    Period::Year => (12, 30),
  };

  let start = NaiveDate::from_ymd_opt(2025, 1, 1);
  let points = (0..buckets)
    .map(|i| TrendPoint {
      date: start
        .map(|d| (d + Duration::days(i * step_days)).to_string())
        .unwrap_or_default(),
      active_students: 280 + (i as u64 * 3) % 40,
      tests_taken: 40 * step_days as u64,
      average_score: 62.0 + (i % 5) as f64,
    })
    .collect();

  Trends { period, points }
}

pub fn subject_performance() -> Vec<SubjectPerformance> {
  [
    ("Mathematics", 64.2, 1840, 0.71),
    ("English", 70.8, 1795, 0.83),
    ("Physics", 58.9, 1120, 0.62),
    ("Chemistry", 61.5, 1064, 0.66),
    ("Biology", 67.3, 1210, 0.78),
  ]
  .into_iter()
  .map(|(subject, average_score, tests_taken, pass_rate)| SubjectPerformance {
    subject: subject.to_string(),
    average_score,
    tests_taken,
    pass_rate,
  })
  .collect()
}
