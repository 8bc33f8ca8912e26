use std::collections::{HashMap, HashSet};

use chrono::{Locale, NaiveDate, NaiveTime};

use crate::models::{Category, CategoryTotal, Expense};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const UNDATED: &str = "Undated";
pub const DEFAULT_LOCALE: Locale = Locale::en_US;

/// Expenses of one calendar month, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthGroup<'a> {
  pub label: String,
  pub total: f64,
  pub expenses: Vec<&'a Expense>,
}

pub fn parse_locale(tag: &str) -> Locale {
  let normalized = tag.trim().replace('-', "_");
  Locale::try_from(normalized.as_str()).unwrap_or(DEFAULT_LOCALE)
}

/// "Month Year" in the viewer's locale, e.g. `January 2024`.
pub fn month_label(date: NaiveDate, locale: Locale) -> String {
  date
    .and_time(NaiveTime::MIN)
    .and_utc()
    .format_localized("%B %Y", locale)
    .to_string()
}

pub fn expense_month(expense: &Expense, locale: Locale) -> String {
  expense
    .occurred_on()
    .map(|date| month_label(date, locale))
    .unwrap_or_else(|| UNDATED.to_string())
}

pub fn category_name(categories: &[Category], id: Option<i64>) -> &str {
  id.and_then(|id| categories.iter().find(|cat| cat.id == id))
    .map(|cat| cat.name.as_str())
    .unwrap_or(UNCATEGORIZED)
}

pub fn total_amount<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> f64 {
  expenses.into_iter().map(Expense::amount_value).sum()
}

pub fn format_amount(amount: f64, symbol: &str) -> String {
  format!("{symbol}{amount:.2}")
}

pub fn group_by_month(expenses: &[Expense], locale: Locale) -> Vec<MonthGroup<'_>> {
  let mut groups: Vec<MonthGroup<'_>> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();

  for expense in expenses {
    let label = expense_month(expense, locale);
    let slot = match index.get(&label) {
      Some(slot) => *slot,
      None => {
        index.insert(label.clone(), groups.len());
        groups.push(MonthGroup {
          label,
          total: 0.0,
          expenses: Vec::new(),
        });
        groups.len() - 1
      }
    };
    let group = &mut groups[slot];
    group.total += expense.amount_value();
    group.expenses.push(expense);
  }

  groups
}

pub fn month_options(expenses: &[Expense], locale: Locale) -> Vec<String> {
  let mut seen = HashSet::new();
  expenses
    .iter()
    .map(|expense| expense_month(expense, locale))
    .filter(|label| seen.insert(label.clone()))
    .collect()
}

/// Per-category totals in category order, optionally restricted to one month label.
///
/// Expenses with a missing or unknown category are collected in a trailing
/// `Uncategorized` entry, or added to a category already named that way.
/// Zero totals are dropped.
pub fn category_totals(
  expenses: &[Expense],
  categories: &[Category],
  month: Option<&str>,
  locale: Locale,
) -> Vec<CategoryTotal> {
  let mut order: Vec<&Category> = Vec::new();
  let mut sums: HashMap<i64, f64> = HashMap::new();
  for cat in categories {
    if !sums.contains_key(&cat.id) {
      sums.insert(cat.id, 0.0);
      order.push(cat);
    }
  }

  let mut uncategorized = 0.0;
  for expense in filter_month(expenses, month, locale) {
    match expense.category_id.and_then(|id| sums.get_mut(&id)) {
      Some(sum) => *sum += expense.amount_value(),
      None => uncategorized += expense.amount_value(),
    }
  }

  let mut totals: Vec<CategoryTotal> = order
    .into_iter()
    .map(|cat| CategoryTotal {
      name: cat.name.clone(),
      total: sums.get(&cat.id).copied().unwrap_or(0.0),
    })
    .collect();
  // a real category may already carry the fallback name; its slice absorbs the rest
  match totals.iter_mut().find(|entry| entry.name == UNCATEGORIZED) {
    Some(entry) => entry.total += uncategorized,
    None => totals.push(CategoryTotal {
      name: UNCATEGORIZED.to_string(),
      total: uncategorized,
    }),
  }
  totals.retain(|entry| entry.total != 0.0);
  totals
}

/// Expenses whose resolved category name is `name`, for the drill-down list.
pub fn expenses_in_category<'a>(
  expenses: &'a [Expense],
  categories: &[Category],
  name: &str,
  month: Option<&str>,
  locale: Locale,
) -> Vec<&'a Expense> {
  filter_month(expenses, month, locale)
    .filter(|expense| category_name(categories, expense.category_id) == name)
    .collect()
}

fn filter_month<'a>(
  expenses: &'a [Expense],
  month: Option<&str>,
  locale: Locale,
) -> impl Iterator<Item = &'a Expense> + 'a {
  let month = month
    .map(str::trim)
    .filter(|value| !value.is_empty())
    .map(str::to_owned);
  expenses.iter().filter(move |expense| match month.as_deref() {
    Some(label) => expense_month(expense, locale) == label,
    None => true,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn expense(id: i64, amount: Option<f64>, date: &str, category_id: Option<i64>) -> Expense {
    Expense {
      id,
      user_id: "u1".to_string(),
      title: format!("expense {id}"),
      amount,
      category_id,
      date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
      receipt_path: None,
      image_path: None,
      image_url: None,
      created_at: None,
    }
  }

  fn categories() -> Vec<Category> {
    vec![
      Category { id: 1, name: "A".to_string() },
      Category { id: 2, name: "B".to_string() },
    ]
  }

  fn sample() -> Vec<Expense> {
    vec![
      expense(1, Some(100.0), "2024-01-05", Some(1)),
      expense(2, Some(50.0), "2024-01-20", Some(2)),
      expense(3, Some(75.0), "2024-02-01", Some(1)),
    ]
  }

  #[test]
  fn groups_by_month_in_first_appearance_order() {
    let expenses = sample();
    let groups = group_by_month(&expenses, DEFAULT_LOCALE);
    let summary: Vec<(&str, f64, usize)> = groups
      .iter()
      .map(|g| (g.label.as_str(), g.total, g.expenses.len()))
      .collect();
    assert_eq!(summary, vec![("January 2024", 150.0, 2), ("February 2024", 75.0, 1)]);
    assert_eq!(groups[0].expenses[0].id, 1);
    assert_eq!(groups[0].expenses[1].id, 2);
  }

  #[test]
  fn newest_first_input_keeps_newest_month_first() {
    let expenses = vec![
      expense(9, Some(5.0), "2024-03-02", Some(1)),
      expense(8, Some(5.0), "2024-01-30", Some(1)),
      expense(7, Some(5.0), "2024-03-01", Some(2)),
    ];
    let labels: Vec<String> = group_by_month(&expenses, DEFAULT_LOCALE)
      .into_iter()
      .map(|g| g.label)
      .collect();
    assert_eq!(labels, vec!["March 2024", "January 2024"]);
    assert_eq!(month_options(&expenses, DEFAULT_LOCALE), labels);
  }

  #[test]
  fn category_totals_unfiltered_and_filtered() {
    let expenses = sample();
    let cats = categories();
    assert_eq!(
      category_totals(&expenses, &cats, None, DEFAULT_LOCALE),
      vec![
        CategoryTotal { name: "A".into(), total: 175.0 },
        CategoryTotal { name: "B".into(), total: 50.0 },
      ]
    );
    assert_eq!(
      category_totals(&expenses, &cats, Some("January 2024"), DEFAULT_LOCALE),
      vec![
        CategoryTotal { name: "A".into(), total: 100.0 },
        CategoryTotal { name: "B".into(), total: 50.0 },
      ]
    );
    assert_eq!(
      category_totals(&expenses, &cats, Some("February 2024"), DEFAULT_LOCALE),
      vec![CategoryTotal { name: "A".into(), total: 75.0 }]
    );
  }

  #[test]
  fn empty_month_filter_means_all_months() {
    let expenses = sample();
    assert_eq!(
      category_totals(&expenses, &categories(), Some(""), DEFAULT_LOCALE),
      category_totals(&expenses, &categories(), None, DEFAULT_LOCALE)
    );
  }

  #[test]
  fn dangling_and_missing_categories_become_uncategorized() {
    let expenses = vec![
      expense(1, Some(10.0), "2024-01-05", Some(1)),
      expense(2, Some(20.0), "2024-01-06", Some(42)),
      expense(3, Some(5.0), "2024-01-07", None),
    ];
    let cats = categories();
    assert_eq!(category_name(&cats, Some(42)), UNCATEGORIZED);
    assert_eq!(category_name(&cats, None), UNCATEGORIZED);
    assert_eq!(category_name(&cats, Some(2)), "B");
    assert_eq!(
      category_totals(&expenses, &cats, None, DEFAULT_LOCALE),
      vec![
        CategoryTotal { name: "A".into(), total: 10.0 },
        CategoryTotal { name: UNCATEGORIZED.into(), total: 25.0 },
      ]
    );
    let drill = expenses_in_category(&expenses, &cats, UNCATEGORIZED, None, DEFAULT_LOCALE);
    assert_eq!(drill.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);
  }

  #[test]
  fn named_uncategorized_category_shares_one_slice() {
    let cats = vec![
      Category { id: 1, name: UNCATEGORIZED.into() },
      Category { id: 2, name: "B".into() },
    ];
    let expenses = vec![
      expense(1, Some(5.0), "2024-01-05", Some(1)),
      expense(2, Some(7.0), "2024-01-06", Some(9)),
      expense(3, Some(2.0), "2024-01-07", Some(2)),
    ];
    let totals = category_totals(&expenses, &cats, None, DEFAULT_LOCALE);
    assert_eq!(
      totals,
      vec![
        CategoryTotal { name: UNCATEGORIZED.into(), total: 12.0 },
        CategoryTotal { name: "B".into(), total: 2.0 },
      ]
    );
    let drill = expenses_in_category(&expenses, &cats, UNCATEGORIZED, None, DEFAULT_LOCALE);
    assert_eq!(total_amount(drill), totals[0].total);
  }

  #[test]
  fn missing_amounts_count_as_zero() {
    let expenses = vec![
      expense(1, None, "2024-01-05", Some(1)),
      expense(2, Some(f64::NAN), "2024-01-06", Some(1)),
      expense(3, Some(12.5), "2024-01-07", Some(2)),
    ];
    let groups = group_by_month(&expenses, DEFAULT_LOCALE);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].total, 12.5);
    assert_eq!(
      category_totals(&expenses, &categories(), None, DEFAULT_LOCALE),
      vec![CategoryTotal { name: "B".into(), total: 12.5 }]
    );
  }

  #[test]
  fn duplicate_category_ids_are_counted_once() {
    let cats = vec![
      Category { id: 1, name: "A".into() },
      Category { id: 1, name: "A again".into() },
    ];
    let expenses = vec![expense(1, Some(3.0), "2024-01-05", Some(1))];
    assert_eq!(
      category_totals(&expenses, &cats, None, DEFAULT_LOCALE),
      vec![CategoryTotal { name: "A".into(), total: 3.0 }]
    );
  }

  #[test]
  fn empty_input_yields_empty_reports() {
    assert!(group_by_month(&[], DEFAULT_LOCALE).is_empty());
    assert!(category_totals(&[], &categories(), None, DEFAULT_LOCALE).is_empty());
    assert!(month_options(&[], DEFAULT_LOCALE).is_empty());
  }

  #[test]
  fn undated_rows_get_their_own_group() {
    let mut undated = expense(4, Some(1.0), "", Some(1));
    undated.date = None;
    let expenses = vec![expense(1, Some(2.0), "2024-01-05", Some(1)), undated];
    let labels = month_options(&expenses, DEFAULT_LOCALE);
    assert_eq!(labels, vec!["January 2024".to_string(), UNDATED.to_string()]);
  }

  #[test]
  fn month_labels_follow_locale() {
    let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    assert_eq!(month_label(date, parse_locale("en_US")), "January 2024");
    assert_eq!(month_label(date, parse_locale("de-DE")), "Januar 2024");
    assert_eq!(parse_locale("xx_YY"), DEFAULT_LOCALE);
  }

  #[test]
  fn amounts_format_with_two_decimals() {
    assert_eq!(format_amount(150.0, "₹"), "₹150.00");
    assert_eq!(format_amount(9.5, "$"), "$9.50");
  }
}
