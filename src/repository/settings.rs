//! Settings repository (lending policy)

use sqlx::{Pool, Postgres};

use crate::{
    error::{codes, AppError, AppResult},
    models::settings::{Settings, UpdateSettings},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Pool<Postgres>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get the settings row, if one was ever created
    pub async fn get(&self) -> AppResult<Option<Settings>> {
        let settings = sqlx::query_as::<_, Settings>(
            "SELECT * FROM settings ORDER BY setting_id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    /// Apply a partial update; absent fields keep their value
    pub async fn update(&self, data: &UpdateSettings) -> AppResult<Settings> {
        sqlx::query_as::<_, Settings>(
            r#"
            UPDATE settings SET
                borrow_day_limit = COALESCE($1, borrow_day_limit),
                borrow_day_extension_limit = COALESCE($2, borrow_day_extension_limit),
                borrow_max_limit = COALESCE($3, borrow_max_limit)
            WHERE setting_id = (SELECT MIN(setting_id) FROM settings)
            RETURNING *
            "#,
        )
        .bind(data.borrow_day_limit)
        .bind(data.borrow_day_extension_limit)
        .bind(data.borrow_max_limit)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(codes::SETTINGS_NOT_FOUND))
    }
}
