use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Method, Url};
use serde::Deserialize;

use super::client::PlatformClient;
use super::AuthProvider;
use crate::error::{AppError, CODE_API, CODE_AUTH_FAILED, CODE_CONFIG};
use crate::models::{Session, User};

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  refresh_token: String,
  #[serde(default)]
  expires_in: Option<i64>,
  #[serde(default)]
  expires_at: Option<i64>,
  user: User,
}

impl TokenResponse {
  fn into_session(self, now: i64) -> Session {
    Session {
      expires_at: self.expires_at.or(self.expires_in.map(|secs| now + secs)),
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      user: self.user,
    }
  }
}

/// Tokens handed back in the fragment of an OAuth redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: Option<i64>,
}

impl RedirectTokens {
  pub fn into_session(self, user: User) -> Session {
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at: self.expires_at,
      user,
    }
  }
}

/// Reads `#access_token=..&refresh_token=..` from the URL the provider redirected to.
pub fn session_from_redirect(redirect_url: &str, now: i64) -> Result<RedirectTokens, AppError> {
  let url = Url::parse(redirect_url.trim())
    .map_err(|_| AppError::validation("redirect_url", "Redirect URL is invalid"))?;
  // the fragment is form-encoded, so borrow the query parser for it
  let fragment = url.fragment().unwrap_or_default();
  let pairs = Url::parse(&format!("http://localhost/?{fragment}"))
    .map_err(|_| AppError::validation("redirect_url", "Redirect URL is invalid"))?;

  let mut access_token = None;
  let mut refresh_token = None;
  let mut expires_in = None;
  let mut expires_at = None;
  let mut error = None;
  for (key, value) in pairs.query_pairs() {
    match key.as_ref() {
      "access_token" => access_token = Some(value.into_owned()),
      "refresh_token" => refresh_token = Some(value.into_owned()),
      "expires_in" => expires_in = value.parse::<i64>().ok(),
      "expires_at" => expires_at = value.parse::<i64>().ok(),
      "error_description" => error = Some(value.into_owned()),
      "error" if error.is_none() => error = Some(value.into_owned()),
      _ => {}
    }
  }

  if let Some(error) = error {
    return Err(AppError::new(CODE_AUTH_FAILED, error));
  }
  match (access_token, refresh_token) {
    (Some(access_token), Some(refresh_token)) => Ok(RedirectTokens {
      access_token,
      refresh_token,
      expires_at: expires_at.or(expires_in.map(|secs| now + secs)),
    }),
    _ => Err(AppError::new(CODE_AUTH_FAILED, "Sign-in redirect carried no session")),
  }
}

fn auth_failure(err: AppError) -> AppError {
  if err.code == CODE_API {
    AppError::new(CODE_AUTH_FAILED, err.message)
  } else {
    err
  }
}

fn now() -> i64 {
  chrono::Utc::now().timestamp()
}

#[async_trait]
impl AuthProvider for PlatformClient {
  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
    let url = self.endpoint("/auth/v1/token")?;
    let builder = self
      .request(Method::POST, &url, None)
      .query(&[("grant_type", "password")])
      .json(&serde_json::json!({ "email": email, "password": password }));
    let token: TokenResponse = self.send(builder).await.map_err(auth_failure)?;
    info!("[Auth] Signed in as {}", token.user.id);
    Ok(token.into_session(now()))
  }

  async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
    let url = self.endpoint("/auth/v1/signup")?;
    let builder = self
      .request(Method::POST, &url, None)
      .json(&serde_json::json!({ "email": email, "password": password }));
    let body: serde_json::Value = self.send(builder).await.map_err(auth_failure)?;
    if body.get("access_token").is_none() {
      debug!("[Auth] Sign-up pending e-mail confirmation");
      return Ok(None);
    }
    let token: TokenResponse = serde_json::from_value(body)?;
    Ok(Some(token.into_session(now())))
  }

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
    let url = self.endpoint("/auth/v1/token")?;
    debug!("[Auth] Refreshing access token");
    let builder = self
      .request(Method::POST, &url, None)
      .query(&[("grant_type", "refresh_token")])
      .json(&serde_json::json!({ "refresh_token": refresh_token }));
    let token: TokenResponse = self.send(builder).await.map_err(auth_failure)?;
    Ok(token.into_session(now()))
  }

  async fn get_user(&self, access_token: &str) -> Result<User, AppError> {
    let url = self.endpoint("/auth/v1/user")?;
    let builder = self.request(Method::GET, &url, Some(access_token));
    self.send(builder).await.map_err(auth_failure)
  }

  async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
    let url = self.endpoint("/auth/v1/logout")?;
    let builder = self.request(Method::POST, &url, Some(access_token));
    self.send_raw(builder).await?;
    Ok(())
  }

  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String, AppError> {
    let base = self.endpoint("/auth/v1/authorize")?;
    let mut params = vec![("provider", provider)];
    if let Some(redirect_to) = redirect_to.filter(|value| !value.trim().is_empty()) {
      params.push(("redirect_to", redirect_to));
    }
    let url = Url::parse_with_params(&base, &params)
      .map_err(|e| AppError::new(CODE_CONFIG, format!("Invalid platform URL: {e}")))?;
    Ok(url.to_string())
  }
}
