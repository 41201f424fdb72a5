//! Settings service (policy store)

use async_trait::async_trait;
use validator::Validate;

use crate::{
    error::{codes, AppError, AppResult},
    models::settings::{BorrowPolicy, Settings, UpdateSettings},
    repository::Repository,
};

/// Source of the lending limits handed to each borrow operation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn current_policy(&self) -> AppResult<BorrowPolicy>;
}

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
}

impl SettingsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get current settings
    pub async fn get_settings(&self) -> AppResult<Settings> {
        self.repository
            .settings
            .get()
            .await?
            .ok_or_else(|| AppError::not_found(codes::SETTINGS_NOT_FOUND))
    }

    /// Update settings
    pub async fn update_settings(&self, data: UpdateSettings) -> AppResult<Settings> {
        data.validate()?;

        let settings = self.repository.settings.update(&data).await?;
        tracing::info!(
            borrow_day_limit = ?settings.borrow_day_limit,
            borrow_max_limit = settings.borrow_max_limit,
            borrow_day_extension_limit = settings.borrow_day_extension_limit,
            "Lending settings updated"
        );
        Ok(settings)
    }
}

#[async_trait]
impl PolicySource for SettingsService {
    /// A missing settings row yields an empty policy, which borrowing
    /// reports as BORROW_LIMIT_NOT_SET.
    async fn current_policy(&self) -> AppResult<BorrowPolicy> {
        Ok(match self.repository.settings.get().await? {
            Some(settings) => BorrowPolicy::from(&settings),
            None => BorrowPolicy {
                borrow_day_limit: None,
                borrow_max_limit: 0,
                extension_day_limit: 0,
            },
        })
    }
}
