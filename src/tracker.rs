//! View layer: assembles what each screen shows from the platform.
//!
//! Every screen fetches on load and every mutation is followed by a full
//! refetch of the expense list; nothing is patched locally.

use std::sync::Arc;

use chrono::{Locale, Utc};
use log::{info, warn};

use crate::domain::validation;
use crate::error::AppError;
use crate::files::receipts;
use crate::models::{
  Category, Expense, ExpenseForm, ExpensePatch, ExpenseRow, HistoryView, HomeView, LoginInput, MonthSection,
  MonthlyFilter, MonthlyView, ReceiptUpload, Session, Settings, User,
};
use crate::platform::{
  session_from_redirect, AuthProvider, ObjectStore, PlatformClient, PlatformConfig, RecordStore,
};
use crate::reports;
use crate::session::SessionHolder;

/// Sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;
pub const OAUTH_PROVIDER_GOOGLE: &str = "google";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewPrefs {
  pub locale: Locale,
  pub currency_symbol: String,
  pub oauth_redirect_url: Option<String>,
}

impl Default for ViewPrefs {
  fn default() -> Self {
    Self {
      locale: reports::DEFAULT_LOCALE,
      currency_symbol: "₹".to_string(),
      oauth_redirect_url: None,
    }
  }
}

impl From<&Settings> for ViewPrefs {
  fn from(settings: &Settings) -> Self {
    let redirect = settings.oauth_redirect_url.trim();
    Self {
      locale: reports::parse_locale(&settings.locale),
      currency_symbol: settings.currency_symbol.clone(),
      oauth_redirect_url: (!redirect.is_empty()).then(|| redirect.to_string()),
    }
  }
}

pub struct Tracker {
  records: Arc<dyn RecordStore>,
  objects: Arc<dyn ObjectStore>,
  auth: Arc<dyn AuthProvider>,
  session: Arc<SessionHolder>,
  prefs: ViewPrefs,
}

impl Tracker {
  pub fn new(
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    auth: Arc<dyn AuthProvider>,
    session: Arc<SessionHolder>,
    prefs: ViewPrefs,
  ) -> Self {
    Self {
      records,
      objects,
      auth,
      session,
      prefs,
    }
  }

  /// Wires a `PlatformClient` built from the stored settings into all three roles.
  pub fn from_settings(settings: &Settings, session: Arc<SessionHolder>) -> Result<Self, AppError> {
    let client = Arc::new(PlatformClient::new(PlatformConfig::from(settings))?);
    Ok(Self::new(
      client.clone(),
      client.clone(),
      client,
      session,
      ViewPrefs::from(settings),
    ))
  }

  pub fn current_user(&self) -> Result<Option<User>, AppError> {
    self.session.current_user()
  }

  pub async fn sign_in(&self, input: &LoginInput) -> Result<User, AppError> {
    validation::validate_login(input)?;
    let session = self
      .auth
      .sign_in_with_password(input.email.trim(), &input.password)
      .await?;
    let user = session.user.clone();
    self.session.signed_in(session)?;
    Ok(user)
  }

  /// Returns the user when the platform signed them in right away.
  pub async fn sign_up(&self, input: &LoginInput) -> Result<Option<User>, AppError> {
    validation::validate_login(input)?;
    match self.auth.sign_up(input.email.trim(), &input.password).await? {
      Some(session) => {
        let user = session.user.clone();
        self.session.signed_in(session)?;
        Ok(Some(user))
      }
      None => Ok(None),
    }
  }

  pub fn oauth_url(&self, provider: &str) -> Result<String, AppError> {
    self
      .auth
      .authorize_url(provider, self.prefs.oauth_redirect_url.as_deref())
  }

  pub async fn complete_oauth(&self, redirect_url: &str) -> Result<User, AppError> {
    let tokens = session_from_redirect(redirect_url, Utc::now().timestamp())?;
    let user = self.auth.get_user(&tokens.access_token).await?;
    self.session.signed_in(tokens.into_session(user.clone()))?;
    info!("[Tracker] OAuth sign-in completed for {}", user.id);
    Ok(user)
  }

  /// Re-installs a persisted session, refreshing it when stale. A session that
  /// can no longer be refreshed is dropped.
  pub async fn restore(&self, session: Session) -> Result<Option<User>, AppError> {
    if !session.expires_within(Utc::now().timestamp(), REFRESH_MARGIN_SECS) {
      let user = session.user.clone();
      self.session.signed_in(session)?;
      return Ok(Some(user));
    }
    match self.auth.refresh_session(&session.refresh_token).await {
      Ok(fresh) => {
        let user = fresh.user.clone();
        self.session.signed_in(fresh)?;
        Ok(Some(user))
      }
      Err(err) => {
        warn!("[Tracker] Stored session could not be refreshed: {}", err);
        self.session.clear()?;
        Ok(None)
      }
    }
  }

  /// The local session is always dropped; a failed remote logout is only logged.
  pub async fn sign_out(&self) -> Result<(), AppError> {
    let current = self.session.current()?;
    self.session.clear()?;
    if let Some(session) = current {
      if let Err(err) = self.auth.sign_out(&session.access_token).await {
        warn!("[Tracker] Remote sign-out failed: {}", err);
      }
      info!("[Tracker] Signed out {}", session.user.id);
    }
    Ok(())
  }

  pub async fn categories(&self) -> Result<Vec<Category>, AppError> {
    let session = self.active_session().await?;
    self.records.fetch_categories(&session.access_token).await
  }

  pub async fn home(&self) -> Result<HomeView, AppError> {
    let session = self.active_session().await?;
    self.home_for(&session).await
  }

  pub async fn history(&self) -> Result<HistoryView, AppError> {
    let session = self.active_session().await?;
    let (categories, expenses) = self.load(&session).await?;
    let months = reports::group_by_month(&expenses, self.prefs.locale)
      .into_iter()
      .map(|group| MonthSection {
        total_display: reports::format_amount(group.total, &self.prefs.currency_symbol),
        expenses: group
          .expenses
          .into_iter()
          .map(|expense| self.row(expense, &categories))
          .collect(),
        label: group.label,
        total: group.total,
      })
      .collect();
    Ok(HistoryView { months })
  }

  pub async fn monthly(&self, filter: &MonthlyFilter) -> Result<MonthlyView, AppError> {
    let session = self.active_session().await?;
    let (categories, expenses) = self.load(&session).await?;
    let locale = self.prefs.locale;

    let selected_month = non_blank(filter.month.as_deref());
    let selected_category = non_blank(filter.category.as_deref());
    let slices = reports::category_totals(&expenses, &categories, selected_month.as_deref(), locale);
    let category_expenses = match selected_category.as_deref() {
      Some(name) => {
        reports::expenses_in_category(&expenses, &categories, name, selected_month.as_deref(), locale)
          .into_iter()
          .map(|expense| self.row(expense, &categories))
          .collect()
      }
      None => Vec::new(),
    };

    Ok(MonthlyView {
      month_options: reports::month_options(&expenses, locale),
      selected_month,
      slices,
      selected_category,
      category_expenses,
    })
  }

  pub async fn add_expense(&self, form: &ExpenseForm, receipt: Option<ReceiptUpload>) -> Result<HomeView, AppError> {
    let fields = validation::validate_expense(form, today())?;
    let session = self.active_session().await?;
    let created = self
      .records
      .insert_expense(&session.access_token, &session.user.id, &fields)
      .await?;
    info!("[Tracker] Created expense {}", created.id);
    if let Some(receipt) = receipt {
      self.attach_receipt(&session, &created, receipt).await?;
    }
    self.home_for(&session).await
  }

  pub async fn update_expense(
    &self,
    id: i64,
    form: &ExpenseForm,
    receipt: Option<ReceiptUpload>,
  ) -> Result<HomeView, AppError> {
    let fields = validation::validate_expense(form, today())?;
    let session = self.active_session().await?;
    let updated = self
      .records
      .update_expense(&session.access_token, id, &ExpensePatch::from(&fields))
      .await?;
    info!("[Tracker] Updated expense {}", updated.id);
    if let Some(receipt) = receipt {
      self.attach_receipt(&session, &updated, receipt).await?;
    }
    self.home_for(&session).await
  }

  pub async fn delete_expense(&self, id: i64) -> Result<HomeView, AppError> {
    let session = self.active_session().await?;
    self.records.delete_expense(&session.access_token, id).await?;
    info!("[Tracker] Deleted expense {}", id);
    self.home_for(&session).await
  }

  pub fn receipt_url(&self, path: &str) -> Option<String> {
    let path = path.trim();
    (!path.is_empty()).then(|| self.objects.public_url(path))
  }

  async fn active_session(&self) -> Result<Session, AppError> {
    let session = self.session.current()?.ok_or_else(AppError::auth_required)?;
    if !session.expires_within(Utc::now().timestamp(), REFRESH_MARGIN_SECS) {
      return Ok(session);
    }
    let fresh = self.auth.refresh_session(&session.refresh_token).await?;
    self.session.refreshed(fresh.clone())?;
    Ok(fresh)
  }

  async fn load(&self, session: &Session) -> Result<(Vec<Category>, Vec<Expense>), AppError> {
    let categories = self.records.fetch_categories(&session.access_token).await?;
    let expenses = self
      .records
      .fetch_expenses(&session.access_token, &session.user.id)
      .await?;
    Ok((categories, expenses))
  }

  async fn home_for(&self, session: &Session) -> Result<HomeView, AppError> {
    let (categories, expenses) = self.load(session).await?;
    let rows = expenses
      .iter()
      .map(|expense| self.row(expense, &categories))
      .collect();
    Ok(HomeView {
      categories,
      expenses: rows,
    })
  }

  /// Upload first, then point the row at the stored file.
  async fn attach_receipt(
    &self,
    session: &Session,
    expense: &Expense,
    receipt: ReceiptUpload,
  ) -> Result<Expense, AppError> {
    let path = receipts::storage_path(
      &session.user.id,
      expense.id,
      &receipt.extension,
      Utc::now().timestamp_millis(),
    );
    let stored = self
      .objects
      .upload(&session.access_token, &path, receipt.bytes, &receipt.content_type)
      .await?;
    self
      .records
      .update_expense(&session.access_token, expense.id, &ExpensePatch::receipt(stored))
      .await
  }

  fn row(&self, expense: &Expense, categories: &[Category]) -> ExpenseRow {
    let amount = expense.amount_value();
    ExpenseRow {
      id: expense.id,
      title: expense.title.clone(),
      amount,
      amount_display: reports::format_amount(amount, &self.prefs.currency_symbol),
      category_id: expense.category_id,
      category_name: reports::category_name(categories, expense.category_id).to_string(),
      date: expense.occurred_on(),
      month: reports::expense_month(expense, self.prefs.locale),
      receipt_url: expense.receipt().and_then(|path| self.receipt_url(path)),
      receipt_path: expense.receipt().map(str::to_string),
    }
  }
}

fn non_blank(value: Option<&str>) -> Option<String> {
  value
    .map(str::trim)
    .filter(|value| !value.is_empty())
    .map(str::to_string)
}

fn today() -> chrono::NaiveDate {
  chrono::Local::now().date_naive()
}
