#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod commands;

use std::sync::{Arc, RwLock};

use expense_tracker::db::{self, Db};
use expense_tracker::models::AuthEvent;
use expense_tracker::session::{self, SessionHolder};
use expense_tracker::{settings, AppError, Tracker};
use log::{error, info, warn};
use tauri::async_runtime::spawn;
use tauri::{AppHandle, Emitter, Manager};
use tokio::sync::broadcast::error::RecvError;

pub const AUTH_CHANGED_EVENT: &str = "auth-changed";

pub struct AppState {
  pub db: Arc<Db>,
  pub session: Arc<SessionHolder>,
  pub tracker: RwLock<Arc<Tracker>>,
}

impl AppState {
  pub fn tracker(&self) -> Result<Arc<Tracker>, AppError> {
    Ok(self.tracker.read()?.clone())
  }

  /// Swaps in a tracker built from new settings; the signed-in session is kept.
  pub fn rebuild_tracker(&self, settings: &expense_tracker::models::Settings) -> Result<(), AppError> {
    let tracker = Tracker::from_settings(settings, self.session.clone())?;
    *self.tracker.write()? = Arc::new(tracker);
    Ok(())
  }
}

fn main() {
  let app_dir = db::resolve_app_dir().expect("Failed to resolve app data directory");
  let db = Arc::new(db::init_db(&app_dir).expect("Failed to initialize database"));
  let stored = db::with_conn(&db, |conn| settings::get_settings(conn)).expect("Failed to load settings");
  let session = Arc::new(SessionHolder::new());
  let tracker = Tracker::from_settings(&stored, session.clone()).expect("Failed to initialize platform client");

  let log_level = if cfg!(debug_assertions) {
    log::LevelFilter::Debug
  } else {
    log::LevelFilter::Info
  };

  tauri::Builder::default()
    .plugin(tauri_plugin_log::Builder::new().level(log_level).build())
    .plugin(tauri_plugin_dialog::init())
    .manage(AppState {
      db,
      session,
      tracker: RwLock::new(Arc::new(tracker)),
    })
    .setup(|app| {
      let state = app.state::<AppState>();
      info!("[App] Data directory {}", state.db.db_path.display());
      spawn_session_persistence(app.handle().clone(), state.db.clone(), state.session.clone());
      spawn_session_restore(app.handle().clone());
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      commands::get_settings,
      commands::update_settings,
      commands::get_session,
      commands::sign_in,
      commands::sign_up,
      commands::sign_out,
      commands::google_sign_in,
      commands::complete_oauth_sign_in,
      commands::list_categories,
      commands::get_home,
      commands::get_history,
      commands::get_monthly,
      commands::create_expense,
      commands::update_expense,
      commands::delete_expense,
      commands::receipt_url,
      commands::open_receipt,
      commands::preview_receipt_file,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}

/// Mirrors every auth change into the local database and on to the window.
fn spawn_session_persistence(app: AppHandle, db: Arc<Db>, holder: Arc<SessionHolder>) {
  let mut events = holder.subscribe();
  spawn(async move {
    loop {
      let event = match events.recv().await {
        Ok(event) => event,
        Err(RecvError::Lagged(skipped)) => {
          warn!("[App] Missed {} auth events", skipped);
          continue;
        }
        Err(RecvError::Closed) => break,
      };

      let persisted = match &event {
        AuthEvent::SignedIn(_) | AuthEvent::TokenRefreshed(_) => match holder.current() {
          Ok(Some(current)) => db::with_conn(&db, |conn| session::save_session(conn, &current)),
          Ok(None) => Ok(()),
          Err(err) => Err(err),
        },
        AuthEvent::SignedOut => db::with_conn(&db, |conn| session::clear_session(conn)),
      };
      if let Err(err) = persisted {
        error!("[App] Failed to persist session: {}", err);
      }
      if let Err(err) = app.emit(AUTH_CHANGED_EVENT, &event) {
        warn!("[App] Failed to emit {}: {}", AUTH_CHANGED_EVENT, err);
      }
    }
  });
}

fn spawn_session_restore(app: AppHandle) {
  spawn(async move {
    let state = app.state::<AppState>();
    let stored = match db::with_conn(&state.db, |conn| session::load_session(conn)) {
      Ok(Some(stored)) => stored,
      Ok(None) => return,
      Err(err) => {
        error!("[App] Failed to read stored session: {}", err);
        return;
      }
    };
    let tracker = match state.tracker() {
      Ok(tracker) => tracker,
      Err(err) => {
        error!("[App] {}", err);
        return;
      }
    };
    match tracker.restore(stored).await {
      Ok(Some(user)) => info!("[App] Restored session for {}", user.id),
      Ok(None) => {
        info!("[App] Stored session expired");
        if let Err(err) = db::with_conn(&state.db, |conn| session::clear_session(conn)) {
          error!("[App] Failed to drop stored session: {}", err);
        }
      }
      Err(err) => error!("[App] Failed to restore session: {}", err),
    }
  });
}
