//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrows, health, settings};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf Lending API",
        version = "1.0.0",
        description = "Borrowing lifecycle of the Bookshelf library backend",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrowing
        borrows::create_borrow,
        borrows::create_pdf_access,
        borrows::extend_borrow,
        borrows::list_my_borrows,
        borrows::list_all_borrows,
        borrows::update_borrow_status,
        borrows::update_request_status,
        borrows::delete_borrow,
        // Status projections
        borrows::count_by_borrow_status,
        borrows::count_my_by_borrow_status,
        borrows::list_by_borrow_status,
        borrows::list_my_by_borrow_status,
        borrows::count_by_request_status,
        borrows::count_my_by_request_status,
        borrows::list_by_request_status,
        borrows::list_my_by_request_status,
        // Settings
        settings::get_public_settings,
        settings::get_settings,
        settings::update_settings,
    ),
    components(
        schemas(
            // Borrowing
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::RequestStatus,
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowDetail,
            crate::models::borrow::BorrowCount,
            crate::models::borrow::CreateBorrow,
            crate::models::borrow::ExtendBorrow,
            crate::models::borrow::UpdateStatus,
            // Settings
            crate::models::settings::Settings,
            crate::models::settings::UpdateSettings,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrow", description = "Borrowing lifecycle"),
        (name = "settings", description = "Lending limits")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
