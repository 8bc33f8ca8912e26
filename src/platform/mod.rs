//! Contracts for the hosted backend platform.
//!
//! The tracker only ever talks to these traits; `PlatformClient` implements
//! all three over the platform's REST endpoints.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Category, Expense, ExpenseFields, ExpensePatch, Session, User};

mod auth;
mod client;

pub use auth::{session_from_redirect, RedirectTokens};
pub use client::{PlatformClient, PlatformConfig};

/// Relational records, scoped by the caller's access token.
#[async_trait]
pub trait RecordStore: Send + Sync {
  async fn fetch_categories(&self, access_token: &str) -> Result<Vec<Category>, AppError>;

  /// Newest occurrence first, then newest creation.
  async fn fetch_expenses(&self, access_token: &str, owner_id: &str) -> Result<Vec<Expense>, AppError>;

  async fn insert_expense(
    &self,
    access_token: &str,
    owner_id: &str,
    fields: &ExpenseFields,
  ) -> Result<Expense, AppError>;

  async fn update_expense(&self, access_token: &str, id: i64, patch: &ExpensePatch) -> Result<Expense, AppError>;

  /// Fails with `NOT_FOUND` when no visible row had that id.
  async fn delete_expense(&self, access_token: &str, id: i64) -> Result<(), AppError>;
}

/// Receipt file storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Returns the stored path inside the bucket.
  async fn upload(
    &self,
    access_token: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, AppError>;

  fn public_url(&self, path: &str) -> String;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError>;

  /// `None` while the platform waits for e-mail confirmation.
  async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError>;

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError>;

  async fn get_user(&self, access_token: &str) -> Result<User, AppError>;

  async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String, AppError>;
}
