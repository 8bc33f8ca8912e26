use serde::Serialize;

pub const CODE_VALIDATION: &str = "VALIDATION";
pub const CODE_AUTH_REQUIRED: &str = "AUTH_REQUIRED";
pub const CODE_AUTH_FAILED: &str = "AUTH_FAILED";
pub const CODE_NETWORK: &str = "NETWORK";
pub const CODE_API: &str = "API_ERROR";
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_CONFIG: &str = "CONFIG_MISSING";

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
  pub code: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
      field: None,
    }
  }

  /// Form input rejected before any remote call; `field` names the input.
  pub fn validation(field: &str, message: impl Into<String>) -> Self {
    Self {
      code: CODE_VALIDATION.to_string(),
      message: message.into(),
      field: Some(field.to_string()),
    }
  }

  pub fn auth_required() -> Self {
    AppError::new(CODE_AUTH_REQUIRED, "Please sign in first")
  }

  pub fn is_validation(&self) -> bool {
    self.code == CODE_VALIDATION
  }

  /// Failures coming from the hosted platform. Shown once as a notification, not retried.
  pub fn is_remote(&self) -> bool {
    matches!(
      self.code.as_str(),
      CODE_NETWORK | CODE_API | CODE_NOT_FOUND | CODE_AUTH_FAILED
    )
  }
}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::new("DB_ERROR", err.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new("IO_ERROR", err.to_string())
  }
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::new(CODE_NETWORK, err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::new("DECODE", err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::new("LOCK_ERROR", "State lock failed")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validation_errors_carry_the_field() {
    let err = AppError::validation("title", "Title is required");
    assert!(err.is_validation());
    assert!(!err.is_remote());
    assert_eq!(err.field.as_deref(), Some("title"));
    assert_eq!(err.to_string(), "VALIDATION: Title is required");
  }

  #[test]
  fn field_is_omitted_from_json_when_absent() {
    let err = AppError::new(CODE_NETWORK, "offline");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json, serde_json::json!({ "code": "NETWORK", "message": "offline" }));
    assert!(err.is_remote());
  }
}
