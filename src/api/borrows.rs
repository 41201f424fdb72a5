//! Borrowing endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrow::{
        BorrowCount, BorrowDetail, BorrowRecord, CreateBorrow, ExtendBorrow, StatusFilter,
        UpdateStatus,
    },
};

use super::AuthenticatedUser;

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "borrow",
    security(("bearer_auth" = [])),
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Borrow created", body = BorrowRecord),
        (status = 400, description = "Invalid or too distant return date"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book unavailable, already borrowed or limit exceeded"),
        (status = 500, description = "Borrow day limit not configured")
    )
)]
pub async fn create_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrow>,
) -> AppResult<(StatusCode, Json<BorrowRecord>)> {
    let record = state.services.borrows.create_borrow(claims.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Open a book's PDF (idempotent)
#[utoipa::path(
    post,
    path = "/borrow/pdf/{book_id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "PDF access record", body = BorrowRecord),
        (status = 400, description = "Book has no PDF"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_pdf_access(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state
        .services
        .borrows
        .create_pdf_access(claims.user_id, book_id)
        .await?;
    Ok(Json(record))
}

/// Extend the due date of one of the caller's active borrows
#[utoipa::path(
    post,
    path = "/borrow/extend",
    tag = "borrow",
    security(("bearer_auth" = [])),
    request_body = ExtendBorrow,
    responses(
        (status = 200, description = "Borrow extended", body = BorrowRecord),
        (status = 400, description = "Extension exceeds the allowance"),
        (status = 404, description = "No active borrow for this book")
    )
)]
pub async fn extend_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ExtendBorrow>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state
        .services
        .borrows
        .extend_due_date(claims.user_id, request)
        .await?;
    Ok(Json(record))
}

/// Caller's own borrows
#[utoipa::path(
    get,
    path = "/borrow/my",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's borrows", body = Vec<BorrowDetail>)
    )
)]
pub async fn list_my_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    let borrows = state.services.borrows.list(Some(claims.user_id)).await?;
    Ok(Json(borrows))
}

/// All borrows (admin)
#[utoipa::path(
    get,
    path = "/borrow/",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All borrows", body = Vec<BorrowDetail>),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_all_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    claims.require_admin()?;

    let borrows = state.services.borrows.list(None).await?;
    Ok(Json(borrows))
}

/// Change the borrow status of a record
#[utoipa::path(
    patch,
    path = "/borrow/{id}/status",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Status changed", body = BorrowDetail),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Transition not allowed for caller"),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Invalid status transition")
    )
)]
pub async fn update_borrow_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
    Json(request): Json<UpdateStatus>,
) -> AppResult<Json<BorrowDetail>> {
    let borrow = state
        .services
        .borrows
        .transition_borrow_status(&claims, borrow_id, &request.status)
        .await?;
    Ok(Json(borrow))
}

/// Change the request (approval) status of a record (admin)
#[utoipa::path(
    patch,
    path = "/borrow/{id}/request",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Request status changed", body = BorrowDetail),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn update_request_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
    Json(request): Json<UpdateStatus>,
) -> AppResult<Json<BorrowDetail>> {
    let borrow = state
        .services
        .borrows
        .transition_request_status(&claims, borrow_id, &request.status)
        .await?;
    Ok(Json(borrow))
}

/// Delete a borrow record (admin)
#[utoipa::path(
    delete,
    path = "/borrow/{id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 204, description = "Borrow deleted"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn delete_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.borrows.delete_borrow(&claims, borrow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Status projections
// ---------------------------------------------------------------------------

/// Count all borrows with a borrow status (admin)
#[utoipa::path(
    get,
    path = "/borrow/status/{status}/count",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "pending, borrowed, pdf-viewed, returned, overdue or rejected")),
    responses(
        (status = 200, description = "Count", body = BorrowCount),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn count_by_borrow_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<BorrowCount>> {
    claims.require_admin()?;
    let filter = StatusFilter::borrow(&status)?;

    let count = state.services.borrows.count_by(filter, None).await?;
    Ok(Json(BorrowCount { count }))
}

/// Count the caller's borrows with a borrow status (admins get the global count)
#[utoipa::path(
    get,
    path = "/borrow/status/{status}/count/my",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Borrow status")),
    responses(
        (status = 200, description = "Count", body = BorrowCount)
    )
)]
pub async fn count_my_by_borrow_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<BorrowCount>> {
    let filter = StatusFilter::borrow(&status)?;

    let count = state.services.borrows.count_by(filter, claims.scope()).await?;
    Ok(Json(BorrowCount { count }))
}

/// List all borrows with a borrow status (admin)
#[utoipa::path(
    get,
    path = "/borrow/status/{status}/list",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Borrow status")),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowDetail>),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_by_borrow_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    claims.require_admin()?;
    let filter = StatusFilter::borrow(&status)?;

    let borrows = state.services.borrows.list_by(filter, None).await?;
    Ok(Json(borrows))
}

/// List the caller's borrows with a borrow status
#[utoipa::path(
    get,
    path = "/borrow/status/{status}/list/my",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Borrow status")),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowDetail>)
    )
)]
pub async fn list_my_by_borrow_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    let filter = StatusFilter::borrow(&status)?;

    let borrows = state.services.borrows.list_by(filter, claims.scope()).await?;
    Ok(Json(borrows))
}

/// Count all borrows with a request status (admin)
#[utoipa::path(
    get,
    path = "/borrow/request/{status}/count",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "pending, accepted or rejected")),
    responses(
        (status = 200, description = "Count", body = BorrowCount),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn count_by_request_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<BorrowCount>> {
    claims.require_admin()?;
    let filter = StatusFilter::request(&status)?;

    let count = state.services.borrows.count_by(filter, None).await?;
    Ok(Json(BorrowCount { count }))
}

/// Count the caller's borrows with a request status
#[utoipa::path(
    get,
    path = "/borrow/request/{status}/count/my",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Request status")),
    responses(
        (status = 200, description = "Count", body = BorrowCount)
    )
)]
pub async fn count_my_by_request_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<BorrowCount>> {
    let filter = StatusFilter::request(&status)?;

    let count = state.services.borrows.count_by(filter, claims.scope()).await?;
    Ok(Json(BorrowCount { count }))
}

/// List all borrows with a request status (admin)
#[utoipa::path(
    get,
    path = "/borrow/request/{status}/list",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Request status")),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowDetail>),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_by_request_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    claims.require_admin()?;
    let filter = StatusFilter::request(&status)?;

    let borrows = state.services.borrows.list_by(filter, None).await?;
    Ok(Json(borrows))
}

/// List the caller's borrows with a request status
#[utoipa::path(
    get,
    path = "/borrow/request/{status}/list/my",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(("status" = String, Path, description = "Request status")),
    responses(
        (status = 200, description = "Borrows", body = Vec<BorrowDetail>)
    )
)]
pub async fn list_my_by_request_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(status): Path<String>,
) -> AppResult<Json<Vec<BorrowDetail>>> {
    let filter = StatusFilter::request(&status)?;

    let borrows = state.services.borrows.list_by(filter, claims.scope()).await?;
    Ok(Json(borrows))
}
