//! Personal expense tracker backed by a hosted data platform.
//!
//! The desktop shell in `main.rs` is a thin command layer; everything it
//! exposes lives here so it can be exercised without a window.

pub mod db;
pub mod domain;
pub mod error;
pub mod files;
pub mod models;
pub mod platform;
pub mod reports;
pub mod session;
pub mod settings;
pub mod tracker;

pub use error::AppError;
pub use tracker::{Tracker, ViewPrefs};
