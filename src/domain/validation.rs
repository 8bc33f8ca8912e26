use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::{ExpenseFields, ExpenseForm, LoginInput};

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
    .map_err(|_| AppError::validation("date", "Date must be YYYY-MM-DD"))
}

pub fn parse_amount(raw: &str) -> Result<f64, AppError> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(AppError::validation("amount", "Amount is required"));
  }
  let amount: f64 = raw
    .parse()
    .map_err(|_| AppError::validation("amount", "Amount must be a number"))?;
  if !amount.is_finite() {
    return Err(AppError::validation("amount", "Amount must be a number"));
  }
  if amount < 0.0 {
    return Err(AppError::validation("amount", "Amount must not be negative"));
  }
  Ok(amount)
}

/// Checks the expense form; a blank date means `today`.
pub fn validate_expense(form: &ExpenseForm, today: NaiveDate) -> Result<ExpenseFields, AppError> {
  let title = form.title.trim();
  if title.is_empty() {
    return Err(AppError::validation("title", "Title is required"));
  }
  let amount = parse_amount(&form.amount)?;
  let category_id = form
    .category_id
    .ok_or_else(|| AppError::validation("category_id", "Category is required"))?;
  let date = match form.date.as_deref().map(str::trim) {
    Some(value) if !value.is_empty() => parse_date(value)?,
    _ => today,
  };

  Ok(ExpenseFields {
    title: title.to_string(),
    amount,
    category_id,
    date,
  })
}

pub fn validate_login(input: &LoginInput) -> Result<(), AppError> {
  let email = input.email.trim();
  if email.is_empty() {
    return Err(AppError::validation("email", "Email is required"));
  }
  if !email.contains('@') {
    return Err(AppError::validation("email", "Email address is invalid"));
  }
  if input.password.is_empty() {
    return Err(AppError::validation("password", "Password is required"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
  }

  fn form(title: &str, amount: &str, category_id: Option<i64>, date: Option<&str>) -> ExpenseForm {
    ExpenseForm {
      title: title.to_string(),
      amount: amount.to_string(),
      category_id,
      date: date.map(str::to_string),
    }
  }

  #[test]
  fn accepts_complete_form() {
    let fields = validate_expense(&form("  Lunch ", "12.40", Some(3), Some("2024-05-01")), today()).unwrap();
    assert_eq!(fields.title, "Lunch");
    assert_eq!(fields.amount, 12.4);
    assert_eq!(fields.category_id, 3);
    assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
  }

  #[test]
  fn blank_date_defaults_to_today() {
    let fields = validate_expense(&form("Lunch", "0", Some(3), Some(" ")), today()).unwrap();
    assert_eq!(fields.date, today());
    assert_eq!(fields.amount, 0.0);
  }

  #[test]
  fn reports_the_failing_field() {
    let cases = [
      (form("", "1", Some(1), None), "title"),
      (form("x", "", Some(1), None), "amount"),
      (form("x", "ten", Some(1), None), "amount"),
      (form("x", "-2", Some(1), None), "amount"),
      (form("x", "inf", Some(1), None), "amount"),
      (form("x", "2", None, None), "category_id"),
      (form("x", "2", Some(1), Some("05/01/2024")), "date"),
    ];
    for (input, field) in cases {
      let err = validate_expense(&input, today()).unwrap_err();
      assert!(err.is_validation());
      assert_eq!(err.field.as_deref(), Some(field), "{input:?}");
    }
  }

  #[test]
  fn login_requires_both_fields() {
    let ok = LoginInput { email: "a@b.co".into(), password: "pw".into() };
    assert!(validate_login(&ok).is_ok());

    let no_mail = LoginInput { email: " ".into(), password: "pw".into() };
    assert_eq!(validate_login(&no_mail).unwrap_err().field.as_deref(), Some("email"));

    let bad_mail = LoginInput { email: "nobody".into(), password: "pw".into() };
    assert_eq!(validate_login(&bad_mail).unwrap_err().field.as_deref(), Some("email"));

    let no_pw = LoginInput { email: "a@b.co".into(), password: String::new() };
    assert_eq!(validate_login(&no_pw).unwrap_err().field.as_deref(), Some("password"));
  }
}
