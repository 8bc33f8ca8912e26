use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
  pub platform_url: String,
  pub anon_key: String,
  pub receipts_bucket: String,
  pub locale: String,
  pub currency_symbol: String,
  pub oauth_redirect_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
  #[serde(deserialize_with = "de_id")]
  pub id: i64,
  #[serde(default)]
  pub name: String,
}

/// A row of the `Expenses` table as the platform hands it out.
///
/// Decoding is lenient: a malformed amount, date or category reference
/// becomes `None` instead of failing the whole list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
  #[serde(deserialize_with = "de_id")]
  pub id: i64,
  #[serde(default)]
  pub user_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default, deserialize_with = "de_amount")]
  pub amount: Option<f64>,
  #[serde(default, deserialize_with = "de_opt_id")]
  pub category_id: Option<i64>,
  #[serde(default, deserialize_with = "de_opt_date")]
  pub date: Option<NaiveDate>,
  #[serde(default, deserialize_with = "de_opt_text")]
  pub receipt_path: Option<String>,
  /// Legacy receipt columns, still present on older tables.
  #[serde(default, deserialize_with = "de_opt_text", skip_serializing_if = "Option::is_none")]
  pub image_path: Option<String>,
  #[serde(default, deserialize_with = "de_opt_text", skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(default, deserialize_with = "de_opt_timestamp")]
  pub created_at: Option<DateTime<Utc>>,
}

impl Expense {
  pub fn amount_value(&self) -> f64 {
    self.amount.filter(|value| value.is_finite()).unwrap_or(0.0)
  }

  /// Occurrence date, or the local creation day for rows that predate the `date` column.
  pub fn occurred_on(&self) -> Option<NaiveDate> {
    self
      .date
      .or_else(|| self.created_at.map(|ts| ts.with_timezone(&Local).date_naive()))
  }

  /// Stored receipt path, whichever column carries it.
  pub fn receipt(&self) -> Option<&str> {
    [&self.receipt_path, &self.image_path, &self.image_url]
      .into_iter()
      .filter_map(|path| path.as_deref())
      .map(str::trim)
      .find(|path| !path.is_empty())
  }

  pub fn has_receipt(&self) -> bool {
    self.receipt().is_some()
  }
}

/// Raw expense form input, exactly as typed.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExpenseForm {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub amount: String,
  #[serde(default, deserialize_with = "de_opt_id")]
  pub category_id: Option<i64>,
  #[serde(default)]
  pub date: Option<String>,
}

/// Validated expense fields ready to be written.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ExpenseFields {
  pub title: String,
  pub amount: f64,
  pub category_id: i64,
  pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct NewExpenseRecord<'a> {
  pub user_id: &'a str,
  #[serde(flatten)]
  pub fields: &'a ExpenseFields,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ExpensePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub receipt_path: Option<String>,
}

impl From<&ExpenseFields> for ExpensePatch {
  fn from(fields: &ExpenseFields) -> Self {
    Self {
      title: Some(fields.title.clone()),
      amount: Some(fields.amount),
      category_id: Some(fields.category_id),
      date: Some(fields.date),
      receipt_path: None,
    }
  }
}

impl ExpensePatch {
  pub fn receipt(path: impl Into<String>) -> Self {
    Self {
      receipt_path: Some(path.into()),
      ..Self::default()
    }
  }
}

#[derive(Clone, PartialEq)]
pub struct ReceiptUpload {
  pub file_name: String,
  pub extension: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ReceiptUpload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ReceiptUpload")
      .field("file_name", &self.file_name)
      .field("content_type", &self.content_type)
      .field("size", &self.bytes.len())
      .finish()
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoginInput {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  /// Unix seconds.
  #[serde(default)]
  pub expires_at: Option<i64>,
  pub user: User,
}

impl Session {
  pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
    match self.expires_at {
      Some(expires_at) => expires_at - now <= margin_secs,
      None => false,
    }
  }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", content = "user", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
  SignedIn(User),
  TokenRefreshed(User),
  SignedOut,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ExpenseRow {
  pub id: i64,
  pub title: String,
  pub amount: f64,
  pub amount_display: String,
  pub category_id: Option<i64>,
  pub category_name: String,
  pub date: Option<NaiveDate>,
  pub month: String,
  pub receipt_path: Option<String>,
  pub receipt_url: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HomeView {
  pub categories: Vec<Category>,
  pub expenses: Vec<ExpenseRow>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthSection {
  pub label: String,
  pub total: f64,
  pub total_display: String,
  pub expenses: Vec<ExpenseRow>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HistoryView {
  pub months: Vec<MonthSection>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryTotal {
  pub name: String,
  pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MonthlyFilter {
  #[serde(default)]
  pub month: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthlyView {
  pub month_options: Vec<String>,
  pub selected_month: Option<String>,
  pub slices: Vec<CategoryTotal>,
  pub selected_category: Option<String>,
  pub category_expenses: Vec<ExpenseRow>,
}

fn de_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  value_to_id(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid id: {value}")))
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(value_to_id))
}

fn value_to_id(value: &Value) -> Option<i64> {
  match value {
    Value::Number(num) => num.as_i64(),
    Value::String(text) => text.trim().parse().ok(),
    _ => None,
  }
}

fn de_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  let amount = match value {
    Some(Value::Number(num)) => num.as_f64(),
    Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
    _ => None,
  };
  Ok(amount.filter(|value| value.is_finite()))
}

fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(Value::as_str).and_then(|text| {
    let text = text.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
  }))
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(text)) => Some(text),
    _ => None,
  })
}

fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(Value::as_str).and_then(|text| parse_timestamp(text.trim())))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
  if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
    return Some(ts.with_timezone(&Utc));
  }
  // timestamptz columns come back with a `+00:00` offset, plain timestamp ones without any
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f%#z"]
    .iter()
    .find_map(|fmt| {
      DateTime::parse_from_str(text, fmt)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, fmt).ok().map(|ts| ts.and_utc()))
    })
}
