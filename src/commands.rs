use log::info;
use serde::Serialize;
use tauri::State;

use expense_tracker::db;
use expense_tracker::error::AppError;
use expense_tracker::files::receipts;
use expense_tracker::models::*;
use expense_tracker::settings;
use expense_tracker::tracker::OAUTH_PROVIDER_GOOGLE;

use crate::AppState;

#[tauri::command]
pub fn get_settings(state: State<AppState>) -> Result<Settings, AppError> {
  db::with_conn(&state.db, |conn| settings::get_settings(conn))
}

#[tauri::command]
pub fn update_settings(state: State<AppState>, settings_input: Settings) -> Result<Settings, AppError> {
  let saved = db::with_conn(&state.db, |conn| settings::update_settings(conn, &settings_input))?;
  state.rebuild_tracker(&saved)?;
  info!("[Settings] Saved, platform {}", saved.platform_url);
  Ok(saved)
}

#[tauri::command]
pub fn get_session(state: State<AppState>) -> Result<Option<User>, AppError> {
  state.session.current_user()
}

#[tauri::command]
pub async fn sign_in(state: State<'_, AppState>, input: LoginInput) -> Result<User, AppError> {
  let tracker = state.tracker()?;
  tracker.sign_in(&input).await
}

#[tauri::command]
pub async fn sign_up(state: State<'_, AppState>, input: LoginInput) -> Result<Option<User>, AppError> {
  let tracker = state.tracker()?;
  tracker.sign_up(&input).await
}

#[tauri::command]
pub async fn sign_out(state: State<'_, AppState>) -> Result<(), AppError> {
  let tracker = state.tracker()?;
  tracker.sign_out().await
}

/// Opens the provider's consent page in the system browser.
#[tauri::command]
pub fn google_sign_in(state: State<AppState>) -> Result<String, AppError> {
  let url = state.tracker()?.oauth_url(OAUTH_PROVIDER_GOOGLE)?;
  open::that(&url).map_err(|err| AppError::new("OAUTH_OPEN", err.to_string()))?;
  Ok(url)
}

#[tauri::command]
pub async fn complete_oauth_sign_in(state: State<'_, AppState>, redirect_url: String) -> Result<User, AppError> {
  let tracker = state.tracker()?;
  tracker.complete_oauth(&redirect_url).await
}

#[tauri::command]
pub async fn list_categories(state: State<'_, AppState>) -> Result<Vec<Category>, AppError> {
  let tracker = state.tracker()?;
  tracker.categories().await
}

#[tauri::command]
pub async fn get_home(state: State<'_, AppState>) -> Result<HomeView, AppError> {
  let tracker = state.tracker()?;
  tracker.home().await
}

#[tauri::command]
pub async fn get_history(state: State<'_, AppState>) -> Result<HistoryView, AppError> {
  let tracker = state.tracker()?;
  tracker.history().await
}

#[tauri::command]
pub async fn get_monthly(state: State<'_, AppState>, filter: Option<MonthlyFilter>) -> Result<MonthlyView, AppError> {
  let tracker = state.tracker()?;
  tracker.monthly(&filter.unwrap_or_default()).await
}

#[tauri::command]
pub async fn create_expense(
  state: State<'_, AppState>,
  input: ExpenseForm,
  receipt_source: Option<String>,
) -> Result<HomeView, AppError> {
  let receipt = picked_receipt(receipt_source.as_deref())?;
  let tracker = state.tracker()?;
  tracker.add_expense(&input, receipt).await
}

#[tauri::command]
pub async fn update_expense(
  state: State<'_, AppState>,
  id: i64,
  input: ExpenseForm,
  receipt_source: Option<String>,
) -> Result<HomeView, AppError> {
  let receipt = picked_receipt(receipt_source.as_deref())?;
  let tracker = state.tracker()?;
  tracker.update_expense(id, &input, receipt).await
}

#[tauri::command]
pub async fn delete_expense(state: State<'_, AppState>, id: i64) -> Result<HomeView, AppError> {
  let tracker = state.tracker()?;
  tracker.delete_expense(id).await
}

#[tauri::command]
pub fn receipt_url(state: State<AppState>, path: String) -> Result<Option<String>, AppError> {
  Ok(state.tracker()?.receipt_url(&path))
}

#[tauri::command]
pub fn open_receipt(state: State<AppState>, path: String) -> Result<(), AppError> {
  let url = state
    .tracker()?
    .receipt_url(&path)
    .ok_or_else(|| AppError::new("RECEIPT_PATH_EMPTY", "Receipt path missing"))?;
  receipts::open_receipt(&url)
}

#[derive(Serialize)]
pub struct ReceiptPreview {
  pub file_name: String,
  pub content_type: String,
  pub data_url: String,
}

#[tauri::command]
pub fn preview_receipt_file(path: String) -> Result<ReceiptPreview, AppError> {
  let receipt = receipts::load_receipt(&path)?;
  Ok(ReceiptPreview {
    data_url: receipts::preview_data_url(&receipt),
    file_name: receipt.file_name,
    content_type: receipt.content_type,
  })
}

fn picked_receipt(source: Option<&str>) -> Result<Option<ReceiptUpload>, AppError> {
  match source.map(str::trim).filter(|path| !path.is_empty()) {
    Some(path) => receipts::load_receipt(path).map(Some),
    None => Ok(None),
  }
}
