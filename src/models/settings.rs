//! Lending policy (administrator settings)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{codes, AppError, AppResult};

/// Settings row as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Settings {
    pub setting_id: i32,
    /// Days added to the borrow date to get the default return date
    pub borrow_day_limit: Option<i32>,
    /// Maximum days a single extension may add
    pub borrow_day_extension_limit: i32,
    /// Maximum concurrent active borrows per user
    pub borrow_max_limit: i32,
}

/// Longest loan or single extension an administrator may configure, in days
pub const MAX_POLICY_DAYS: i32 = 3650;
/// Highest concurrent borrow limit an administrator may configure
pub const MAX_BORROW_LIMIT: i32 = 1000;

/// Partial settings update (admin)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSettings {
    #[validate(range(min = 0, max = 3650, message = "borrow_day_limit must be between 0 and 3650"))]
    pub borrow_day_limit: Option<i32>,
    #[validate(range(
        min = 0,
        max = 3650,
        message = "borrow_day_extension_limit must be between 0 and 3650"
    ))]
    pub borrow_day_extension_limit: Option<i32>,
    #[validate(range(min = 0, max = 1000, message = "borrow_max_limit must be between 0 and 1000"))]
    pub borrow_max_limit: Option<i32>,
}

/// Limits passed into every lending operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowPolicy {
    pub borrow_day_limit: Option<i32>,
    pub borrow_max_limit: i32,
    pub extension_day_limit: i32,
}

impl BorrowPolicy {
    pub fn day_limit(&self) -> AppResult<i32> {
        self.borrow_day_limit
            .ok_or_else(|| AppError::internal(codes::BORROW_LIMIT_NOT_SET))
    }

    pub fn ensure_extension_allowed(&self, extend_days: i32) -> AppResult<()> {
        if extend_days < 1 || extend_days > self.extension_day_limit {
            return Err(AppError::bad_request(codes::EXTENSION_NOT_ALLOWED));
        }
        Ok(())
    }
}

impl From<&Settings> for BorrowPolicy {
    fn from(s: &Settings) -> Self {
        Self {
            borrow_day_limit: s.borrow_day_limit,
            borrow_max_limit: s.borrow_max_limit,
            extension_day_limit: s.borrow_day_extension_limit,
        }
    }
}
