//! Property tests for month grouping and category totals.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Locale, NaiveDate};
use expense_tracker::models::{Category, Expense};
use expense_tracker::reports::{self, UNCATEGORIZED};
use proptest::prelude::*;

const LOCALE: Locale = Locale::en_US;
const EPSILON: f64 = 1e-6;

fn categories() -> Vec<Category> {
  (1..=4)
    .map(|id| Category {
      id,
      name: format!("Category {id}"),
    })
    .collect()
}

/// Same ids, but one real category carries the fallback name.
fn categories_with_fallback_name() -> Vec<Category> {
  let mut categories = categories();
  categories[2].name = UNCATEGORIZED.to_string();
  categories
}

fn arb_expense() -> impl Strategy<Value = Expense> {
  (
    1i64..10_000,
    proptest::option::of(0u32..100_000),
    proptest::option::of(0i64..730),
    // ids 5 and 6 do not exist
    proptest::option::of(1i64..=6),
  )
    .prop_map(|(id, cents, day, category_id)| Expense {
      id,
      user_id: "user-1".to_string(),
      title: format!("expense {id}"),
      amount: cents.map(|cents| f64::from(cents) / 100.0),
      category_id,
      date: day.map(|day| NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(day)),
      receipt_path: None,
      image_path: None,
      image_url: None,
      created_at: None,
    })
}

fn arb_expenses() -> impl Strategy<Value = Vec<Expense>> {
  proptest::collection::vec(arb_expense(), 0..40)
}

fn close(a: f64, b: f64) -> bool {
  (a - b).abs() < EPSILON
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(200))]

  #[test]
  fn month_totals_add_up_to_the_grand_total(expenses in arb_expenses()) {
    let groups = reports::group_by_month(&expenses, LOCALE);
    let grouped: f64 = groups.iter().map(|group| group.total).sum();
    prop_assert!(close(grouped, reports::total_amount(&expenses)));

    let members: usize = groups.iter().map(|group| group.expenses.len()).sum();
    prop_assert_eq!(members, expenses.len());
  }

  #[test]
  fn every_month_appears_once_in_first_seen_order(expenses in arb_expenses()) {
    let groups = reports::group_by_month(&expenses, LOCALE);
    let labels: Vec<String> = groups.iter().map(|group| group.label.clone()).collect();
    let unique: HashSet<&String> = labels.iter().collect();
    prop_assert_eq!(unique.len(), labels.len());
    prop_assert_eq!(labels, reports::month_options(&expenses, LOCALE));

    for group in &groups {
      for expense in &group.expenses {
        prop_assert_eq!(reports::expense_month(expense, LOCALE), group.label.clone());
      }
    }
  }

  #[test]
  fn category_totals_cover_every_amount(expenses in arb_expenses()) {
    let totals = reports::category_totals(&expenses, &categories(), None, LOCALE);
    let sum: f64 = totals.iter().map(|entry| entry.total).sum();
    prop_assert!(close(sum, reports::total_amount(&expenses)));
    prop_assert!(totals.iter().all(|entry| entry.total != 0.0));

    if let Some(position) = totals.iter().position(|entry| entry.name == UNCATEGORIZED) {
      prop_assert_eq!(position, totals.len() - 1);
    }
  }

  #[test]
  fn monthly_totals_partition_the_overall_totals(expenses in arb_expenses()) {
    let categories = categories();
    let overall = reports::category_totals(&expenses, &categories, None, LOCALE);

    let mut combined: HashMap<String, f64> = HashMap::new();
    for month in reports::month_options(&expenses, LOCALE) {
      for entry in reports::category_totals(&expenses, &categories, Some(&month), LOCALE) {
        *combined.entry(entry.name).or_insert(0.0) += entry.total;
      }
    }

    prop_assert_eq!(combined.len(), overall.len());
    for entry in overall {
      let monthly = combined.get(&entry.name).copied().unwrap_or(0.0);
      prop_assert!(close(monthly, entry.total));
    }
  }

  #[test]
  fn drill_down_matches_its_slice(expenses in arb_expenses()) {
    for categories in [categories(), categories_with_fallback_name()] {
      let totals = reports::category_totals(&expenses, &categories, None, LOCALE);
      let names: HashSet<&str> = totals.iter().map(|entry| entry.name.as_str()).collect();
      prop_assert_eq!(names.len(), totals.len());

      let sum: f64 = totals.iter().map(|entry| entry.total).sum();
      prop_assert!(close(sum, reports::total_amount(&expenses)));

      for entry in &totals {
        let members = reports::expenses_in_category(&expenses, &categories, &entry.name, None, LOCALE);
        prop_assert!(close(reports::total_amount(members), entry.total));
      }
    }
  }
}

#[test]
fn empty_inputs_produce_empty_reports() {
  assert!(reports::group_by_month(&[], LOCALE).is_empty());
  assert!(reports::month_options(&[], LOCALE).is_empty());
  assert!(reports::category_totals(&[], &[], None, LOCALE).is_empty());
  assert!(reports::category_totals(&[], &categories(), Some("January 2024"), LOCALE).is_empty());
}
