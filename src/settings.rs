use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::Settings;

const KEY_PLATFORM_URL: &str = "platform_url";
const KEY_ANON_KEY: &str = "anon_key";
const KEY_RECEIPTS_BUCKET: &str = "receipts_bucket";
const KEY_LOCALE: &str = "locale";
const KEY_CURRENCY: &str = "currency_symbol";
const KEY_OAUTH_REDIRECT: &str = "oauth_redirect_url";

pub const ENV_PLATFORM_URL: &str = "EXPENSE_TRACKER_PLATFORM_URL";
pub const ENV_ANON_KEY: &str = "EXPENSE_TRACKER_ANON_KEY";

const DEFAULT_BUCKET: &str = "receipts";
const DEFAULT_LOCALE: &str = "en_US";
const DEFAULT_CURRENCY: &str = "₹";

impl Default for Settings {
  fn default() -> Self {
    Self {
      platform_url: String::new(),
      anon_key: String::new(),
      receipts_bucket: DEFAULT_BUCKET.to_string(),
      locale: DEFAULT_LOCALE.to_string(),
      currency_symbol: DEFAULT_CURRENCY.to_string(),
      oauth_redirect_url: String::new(),
    }
  }
}

pub fn ensure_defaults(conn: &Connection) -> Result<(), AppError> {
  let platform_url = env_value(ENV_PLATFORM_URL).unwrap_or_default();
  let anon_key = env_value(ENV_ANON_KEY).unwrap_or_default();
  let defaults = [
    (KEY_PLATFORM_URL, normalize_url(&platform_url)),
    (KEY_ANON_KEY, anon_key),
    (KEY_RECEIPTS_BUCKET, DEFAULT_BUCKET.to_string()),
    (KEY_LOCALE, DEFAULT_LOCALE.to_string()),
    (KEY_CURRENCY, DEFAULT_CURRENCY.to_string()),
    (KEY_OAUTH_REDIRECT, String::new()),
  ];
  for (key, value) in defaults {
    conn.execute(
      "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
      params![key, value],
    )?;
  }
  Ok(())
}

pub fn get_settings(conn: &Connection) -> Result<Settings, AppError> {
  let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
  let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

  let mut settings = Settings::default();
  for row in rows {
    let (key, value) = row?;
    match key.as_str() {
      KEY_PLATFORM_URL => settings.platform_url = value,
      KEY_ANON_KEY => settings.anon_key = value,
      KEY_RECEIPTS_BUCKET if !value.trim().is_empty() => settings.receipts_bucket = value,
      KEY_LOCALE if !value.trim().is_empty() => settings.locale = value,
      KEY_CURRENCY => settings.currency_symbol = value,
      KEY_OAUTH_REDIRECT => settings.oauth_redirect_url = value,
      _ => {}
    }
  }

  Ok(settings)
}

pub fn update_settings(conn: &Connection, input: &Settings) -> Result<Settings, AppError> {
  let settings = normalize(input)?;
  let values = [
    (KEY_PLATFORM_URL, &settings.platform_url),
    (KEY_ANON_KEY, &settings.anon_key),
    (KEY_RECEIPTS_BUCKET, &settings.receipts_bucket),
    (KEY_LOCALE, &settings.locale),
    (KEY_CURRENCY, &settings.currency_symbol),
    (KEY_OAUTH_REDIRECT, &settings.oauth_redirect_url),
  ];
  for (key, value) in values {
    conn.execute(
      "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
      params![key, value],
    )?;
  }
  Ok(settings)
}

fn normalize(input: &Settings) -> Result<Settings, AppError> {
  let platform_url = normalize_url(&input.platform_url);
  if !platform_url.is_empty() {
    check_http_url("platform_url", &platform_url)?;
  }
  let oauth_redirect_url = input.oauth_redirect_url.trim().to_string();
  if !oauth_redirect_url.is_empty() {
    check_http_url("oauth_redirect_url", &oauth_redirect_url)?;
  }
  let receipts_bucket = input.receipts_bucket.trim().trim_matches('/').to_string();
  if receipts_bucket.is_empty() {
    return Err(AppError::validation("receipts_bucket", "Bucket name is required"));
  }

  Ok(Settings {
    platform_url,
    anon_key: input.anon_key.trim().to_string(),
    receipts_bucket,
    locale: match input.locale.trim() {
      "" => DEFAULT_LOCALE.to_string(),
      value => value.to_string(),
    },
    currency_symbol: input.currency_symbol.trim().to_string(),
    oauth_redirect_url,
  })
}

fn check_http_url(field: &str, value: &str) -> Result<(), AppError> {
  match reqwest::Url::parse(value) {
    Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
    _ => Err(AppError::validation(field, "Must be an http(s) URL")),
  }
}

fn normalize_url(value: &str) -> String {
  value.trim().trim_end_matches('/').to_string()
}

fn env_value(key: &str) -> Option<String> {
  std::env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db;

  #[test]
  fn defaults_are_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let db = db::init_db(dir.path()).unwrap();
    let settings = db::with_conn(&db, |conn| get_settings(conn)).unwrap();
    assert_eq!(settings.receipts_bucket, "receipts");
    assert_eq!(settings.locale, "en_US");
    assert_eq!(settings.currency_symbol, "₹");
  }

  #[test]
  fn update_normalizes_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let db = db::init_db(dir.path()).unwrap();
    let input = Settings {
      platform_url: " https://demo.supabase.co/ ".into(),
      anon_key: " key ".into(),
      receipts_bucket: "/receipts/".into(),
      locale: String::new(),
      currency_symbol: "$".into(),
      oauth_redirect_url: String::new(),
    };
    let saved = db::with_conn(&db, |conn| update_settings(conn, &input)).unwrap();
    assert_eq!(saved.platform_url, "https://demo.supabase.co");
    assert_eq!(saved.anon_key, "key");
    assert_eq!(saved.receipts_bucket, "receipts");
    assert_eq!(saved.locale, "en_US");

    let loaded = db::with_conn(&db, |conn| get_settings(conn)).unwrap();
    assert_eq!(loaded, saved);
  }

  #[test]
  fn rejects_non_http_platform_url() {
    let input = Settings {
      platform_url: "ftp://example.org".into(),
      ..Settings::default()
    };
    let err = normalize(&input).unwrap_err();
    assert_eq!(err.field.as_deref(), Some("platform_url"));
  }
}
