//! API handlers for the Bookshelf REST endpoints

pub mod borrows;
pub mod health;
pub mod openapi;
pub mod settings;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Borrowing
        .route("/borrow", get(borrows::list_all_borrows).post(borrows::create_borrow))
        .route("/borrow/", get(borrows::list_all_borrows).post(borrows::create_borrow))
        .route("/borrow/my", get(borrows::list_my_borrows))
        .route("/borrow/pdf/:book_id", post(borrows::create_pdf_access))
        .route("/borrow/extend", post(borrows::extend_borrow))
        .route("/borrow/:id", delete(borrows::delete_borrow))
        .route("/borrow/:id/status", patch(borrows::update_borrow_status))
        .route("/borrow/:id/request", patch(borrows::update_request_status))
        // Borrow status projections
        .route("/borrow/status/:status/count", get(borrows::count_by_borrow_status))
        .route("/borrow/status/:status/count/my", get(borrows::count_my_by_borrow_status))
        .route("/borrow/status/:status/list", get(borrows::list_by_borrow_status))
        .route("/borrow/status/:status/list/my", get(borrows::list_my_by_borrow_status))
        // Request status projections
        .route("/borrow/request/:status/count", get(borrows::count_by_request_status))
        .route("/borrow/request/:status/count/my", get(borrows::count_my_by_request_status))
        .route("/borrow/request/:status/list", get(borrows::list_by_request_status))
        .route("/borrow/request/:status/list/my", get(borrows::list_my_by_request_status))
        // Settings
        .route("/settings/public", get(settings::get_public_settings))
        .route(
            "/settings/admin",
            get(settings::get_settings)
                .put(settings::update_settings)
                .post(settings::update_settings),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
