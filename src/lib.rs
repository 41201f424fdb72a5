//! Bookshelf Lending
//!
//! The borrowing lifecycle of the Bookshelf library backend: physical
//! borrows with copy accounting, digital PDF access, extensions, overdue
//! reconciliation and the lending limits that govern them, served as a
//! REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
