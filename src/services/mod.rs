//! Business logic services

pub mod borrows;
pub mod settings;

use std::sync::Arc;

use crate::{error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrows: borrows::BorrowsService,
    pub settings: settings::SettingsService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        let settings = settings::SettingsService::new(repository.clone());
        Self {
            borrows: borrows::BorrowsService::new(repository.clone(), Arc::new(settings.clone())),
            settings,
            repository,
        }
    }

    /// Check that the database answers
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.repository.pool).await?;
        Ok(())
    }
}
