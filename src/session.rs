use std::sync::RwLock;

use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::models::{AuthEvent, Session, User};

const EVENT_CAPACITY: usize = 16;

/// Holds the signed-in session and fans out auth changes to subscribers.
pub struct SessionHolder {
  current: RwLock<Option<Session>>,
  events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionHolder {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionHolder {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      current: RwLock::new(None),
      events,
    }
  }

  pub fn current(&self) -> Result<Option<Session>, AppError> {
    Ok(self.current.read()?.clone())
  }

  pub fn current_user(&self) -> Result<Option<User>, AppError> {
    Ok(self.current.read()?.as_ref().map(|session| session.user.clone()))
  }

  pub fn signed_in(&self, session: Session) -> Result<(), AppError> {
    let user = session.user.clone();
    *self.current.write()? = Some(session);
    self.publish(AuthEvent::SignedIn(user));
    Ok(())
  }

  pub fn refreshed(&self, session: Session) -> Result<(), AppError> {
    let user = session.user.clone();
    *self.current.write()? = Some(session);
    self.publish(AuthEvent::TokenRefreshed(user));
    Ok(())
  }

  pub fn clear(&self) -> Result<(), AppError> {
    let previous = self.current.write()?.take();
    if previous.is_some() {
      self.publish(AuthEvent::SignedOut);
    }
    Ok(())
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.events.subscribe()
  }

  fn publish(&self, event: AuthEvent) {
    debug!("auth event: {:?}", event);
    // no subscribers is fine
    let _ = self.events.send(event);
  }
}

pub fn save_session(conn: &Connection, session: &Session) -> Result<(), AppError> {
  let payload_json = serde_json::to_string(session)?;
  conn.execute(
    "INSERT OR REPLACE INTO auth_session (id, user_id, payload_json, updated_at) VALUES (1, ?1, ?2, ?3)",
    params![session.user.id, payload_json, Utc::now().to_rfc3339()],
  )?;
  Ok(())
}

pub fn load_session(conn: &Connection) -> Result<Option<Session>, AppError> {
  let payload: Option<String> = conn
    .query_row("SELECT payload_json FROM auth_session WHERE id = 1", [], |row| row.get(0))
    .optional()?;
  // an unreadable payload just means signing in again
  Ok(payload.and_then(|json| serde_json::from_str(&json).ok()))
}

pub fn clear_session(conn: &Connection) -> Result<(), AppError> {
  conn.execute("DELETE FROM auth_session", [])?;
  Ok(())
}
