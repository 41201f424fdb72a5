//! Settings endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::settings::{Settings, UpdateSettings},
};

use super::AuthenticatedUser;

/// Current lending limits, readable without authentication
#[utoipa::path(
    get,
    path = "/settings/public",
    tag = "settings",
    responses(
        (status = 200, description = "Current lending limits", body = Settings),
        (status = 404, description = "Settings not initialized")
    )
)]
pub async fn get_public_settings(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Settings>> {
    let settings = state.services.settings.get_settings().await?;
    Ok(Json(settings))
}

/// Get current settings (admin)
#[utoipa::path(
    get,
    path = "/settings/admin",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current settings", body = Settings),
        (status = 403, description = "Insufficient permissions")
    )
)]
pub async fn get_settings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Settings>> {
    claims.require_admin()?;

    let settings = state.services.settings.get_settings().await?;
    Ok(Json(settings))
}

/// Update settings (admin)
#[utoipa::path(
    put,
    path = "/settings/admin",
    tag = "settings",
    security(("bearer_auth" = [])),
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Settings updated", body = Settings),
        (status = 400, description = "Negative limit"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Settings not initialized")
    )
)]
pub async fn update_settings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UpdateSettings>,
) -> AppResult<Json<Settings>> {
    claims.require_admin()?;

    let settings = state.services.settings.update_settings(request).await?;
    Ok(Json(settings))
}
