use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{ObjectStore, RecordStore};
use crate::error::{AppError, CODE_API, CODE_AUTH_FAILED, CODE_CONFIG, CODE_NOT_FOUND};
use crate::models::{Category, Expense, ExpenseFields, ExpensePatch, NewExpenseRecord, Settings};

const CATEGORIES_TABLE: &str = "Categories";
const EXPENSES_TABLE: &str = "Expenses";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const EXPENSE_ORDER: &str = "date.desc.nullslast,created_at.desc";

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
  pub base_url: String,
  pub anon_key: String,
  pub receipts_bucket: String,
}

impl From<&Settings> for PlatformConfig {
  fn from(settings: &Settings) -> Self {
    Self {
      base_url: settings.platform_url.trim().trim_end_matches('/').to_string(),
      anon_key: settings.anon_key.trim().to_string(),
      receipts_bucket: settings.receipts_bucket.trim().to_string(),
    }
  }
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorResponse {
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  msg: Option<String>,
  #[serde(default)]
  error_description: Option<String>,
  #[serde(default)]
  error: Option<String>,
}

/// HTTP client for the hosted platform: table queries, storage and auth.
#[derive(Debug, Clone)]
pub struct PlatformClient {
  client: reqwest::Client,
  config: PlatformConfig,
}

impl PlatformClient {
  pub fn new(config: PlatformConfig) -> Result<Self, AppError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
      .build()
      .map_err(|e| AppError::new(CODE_CONFIG, format!("Failed to initialize HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub(crate) fn endpoint(&self, path: &str) -> Result<String, AppError> {
    if self.config.base_url.is_empty() || self.config.anon_key.is_empty() {
      return Err(AppError::new(
        CODE_CONFIG,
        "Platform URL and API key must be configured in settings",
      ));
    }
    Ok(format!("{}{}", self.config.base_url, path))
  }

  /// Every call carries the project key; the bearer is the user's token when there is one.
  pub(crate) fn request(&self, method: Method, url: &str, access_token: Option<&str>) -> RequestBuilder {
    let bearer = access_token.unwrap_or(&self.config.anon_key);
    debug!("[Platform] {} {}", method, url);
    self
      .client
      .request(method, url)
      .header("apikey", &self.config.anon_key)
      .header(AUTHORIZATION, format!("Bearer {bearer}"))
  }

  pub(crate) async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
    let body = self.send_raw(builder).await?;
    serde_json::from_str(&body)
      .map_err(|e| AppError::new(CODE_API, format!("Failed to parse response: {e}")))
  }

  pub(crate) async fn send_raw(&self, builder: RequestBuilder) -> Result<String, AppError> {
    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      return Err(api_error(status, &body));
    }
    Ok(body)
  }

  fn table(&self, table: &str) -> Result<String, AppError> {
    self.endpoint(&format!("/rest/v1/{table}"))
  }

  fn storage_object(&self, path: &str) -> Result<String, AppError> {
    self.endpoint(&format!(
      "/storage/v1/object/{}/{}",
      self.config.receipts_bucket,
      path.trim_start_matches('/')
    ))
  }
}

pub(crate) fn api_error(status: StatusCode, body: &str) -> AppError {
  let detail = serde_json::from_str::<ApiErrorResponse>(body)
    .ok()
    .and_then(|err| err.message.or(err.msg).or(err.error_description).or(err.error))
    .unwrap_or_else(|| body.chars().take(200).collect());
  let message = if detail.trim().is_empty() {
    format!("HTTP {status}")
  } else {
    detail
  };

  let code = match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CODE_AUTH_FAILED,
    StatusCode::NOT_FOUND => CODE_NOT_FOUND,
    _ => CODE_API,
  };
  AppError::new(code, message)
}

fn expenses_query(owner_id: &str) -> Vec<(&'static str, String)> {
  vec![
    ("select", "*".to_string()),
    ("user_id", format!("eq.{owner_id}")),
    ("order", EXPENSE_ORDER.to_string()),
  ]
}

fn by_id(id: i64) -> [(&'static str, String); 1] {
  [("id", format!("eq.{id}"))]
}

/// Row filters that match nothing succeed with an empty body, including rows owned by someone else.
fn ensure_affected<T>(rows: &[T], id: i64) -> Result<(), AppError> {
  if rows.is_empty() {
    return Err(AppError::new(CODE_NOT_FOUND, format!("Expense {id} not found")));
  }
  Ok(())
}

fn return_representation() -> HeaderValue {
  HeaderValue::from_static("return=representation")
}

#[async_trait]
impl RecordStore for PlatformClient {
  async fn fetch_categories(&self, access_token: &str) -> Result<Vec<Category>, AppError> {
    let url = self.table(CATEGORIES_TABLE)?;
    let builder = self
      .request(Method::GET, &url, Some(access_token))
      .query(&[("select", "*"), ("order", "id.asc")]);
    self.send(builder).await
  }

  async fn fetch_expenses(&self, access_token: &str, owner_id: &str) -> Result<Vec<Expense>, AppError> {
    let url = self.table(EXPENSES_TABLE)?;
    let builder = self
      .request(Method::GET, &url, Some(access_token))
      .query(&expenses_query(owner_id));
    self.send(builder).await
  }

  async fn insert_expense(
    &self,
    access_token: &str,
    owner_id: &str,
    fields: &ExpenseFields,
  ) -> Result<Expense, AppError> {
    let url = self.table(EXPENSES_TABLE)?;
    let record = NewExpenseRecord {
      user_id: owner_id,
      fields,
    };
    let builder = self
      .request(Method::POST, &url, Some(access_token))
      .header("Prefer", return_representation())
      .json(&record);
    let rows: Vec<Expense> = self.send(builder).await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| AppError::new(CODE_API, "Insert returned no row"))
  }

  async fn update_expense(&self, access_token: &str, id: i64, patch: &ExpensePatch) -> Result<Expense, AppError> {
    let url = self.table(EXPENSES_TABLE)?;
    let builder = self
      .request(Method::PATCH, &url, Some(access_token))
      .query(&by_id(id))
      .header("Prefer", return_representation())
      .json(patch);
    let rows: Vec<Expense> = self.send(builder).await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| AppError::new(CODE_NOT_FOUND, format!("Expense {id} not found")))
  }

  async fn delete_expense(&self, access_token: &str, id: i64) -> Result<(), AppError> {
    let url = self.table(EXPENSES_TABLE)?;
    let builder = self
      .request(Method::DELETE, &url, Some(access_token))
      .query(&by_id(id))
      .header("Prefer", return_representation());
    let rows: Vec<serde_json::Value> = self.send(builder).await?;
    ensure_affected(&rows, id)
  }
}

#[async_trait]
impl ObjectStore for PlatformClient {
  async fn upload(
    &self,
    access_token: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, AppError> {
    let url = self.storage_object(path)?;
    let content_type = HeaderValue::from_str(content_type)
      .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let builder = self
      .request(Method::POST, &url, Some(access_token))
      .header(CONTENT_TYPE, content_type)
      .header("x-upsert", "false")
      .body(bytes);
    self.send_raw(builder).await?;
    Ok(path.trim_start_matches('/').to_string())
  }

  fn public_url(&self, path: &str) -> String {
    format!(
      "{}/storage/v1/object/public/{}/{}",
      self.config.base_url,
      self.config.receipts_bucket,
      path.trim_start_matches('/')
    )
  }
}
