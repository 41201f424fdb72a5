//! Borrowing lifecycle tests against a real Postgres database.
//!
//! Each test gets a fresh database with migrations applied.
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use bookshelf_lending::{
    error::{codes, AppError},
    models::{
        borrow::{BorrowStatus, CreateBorrow, ExtendBorrow, RequestStatus, StatusFilter},
        user::{Role, UserClaims},
    },
    repository::Repository,
    services::Services,
};
use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn claims(user_id: i32, role: Role) -> UserClaims {
    UserClaims {
        sub: format!("user-{}", user_id),
        user_id,
        role,
        exp: 0,
        iat: 0,
    }
}

async fn seed_user(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (user_name, user_email) VALUES ($1, $2) RETURNING user_id",
    )
    .bind(name)
    .bind(format!("{}@example.org", name))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_book(pool: &PgPool, title: &str, copies: i32, pdf: Option<&str>) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO books (book_title, book_pdf, available_copies, book_availabity)
        VALUES ($1, $2, $3, $3 > 0)
        RETURNING book_id
        "#,
    )
    .bind(title)
    .bind(pdf)
    .bind(copies)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn stock(pool: &PgPool, book_id: i32) -> (i32, bool) {
    sqlx::query_as("SELECT available_copies, book_availabity FROM books WHERE book_id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn borrow(book_id: i32) -> CreateBorrow {
    CreateBorrow { book_id, return_date: None }
}

#[sqlx::test]
#[ignore]
async fn test_borrow_reserves_one_copy(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Dune", 3, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();

    assert_eq!(record.borrow_status, BorrowStatus::Pending);
    assert_eq!(record.request_status, RequestStatus::Pending);
    assert_eq!(record.borrow_date, today());
    assert_eq!(record.return_date, today() + Duration::days(14));
    assert_eq!(record.returned_at, None);
    assert_eq!(stock(&pool, book).await, (2, true));
}

#[sqlx::test]
#[ignore]
async fn test_last_copy_then_unavailable(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let ada = seed_user(&pool, "ada").await;
    let bob = seed_user(&pool, "bob").await;
    let book = seed_book(&pool, "Solaris", 1, None).await;

    services.borrows.create_borrow(ada, borrow(book)).await.unwrap();
    assert_eq!(stock(&pool, book).await, (0, false));

    let err = services.borrows.create_borrow(bob, borrow(book)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref c) if c == codes::BOOK_UNAVAILABLE));
    assert_eq!(stock(&pool, book).await, (0, false));
}

#[sqlx::test]
#[ignore]
async fn test_unknown_book(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;

    let err = services.borrows.create_borrow(user, borrow(9999)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref c) if c == codes::BOOK_NOT_FOUND));
}

#[sqlx::test]
#[ignore]
async fn test_duplicate_active_borrow_is_rejected(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Hyperion", 2, None).await;

    services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    let err = services.borrows.create_borrow(user, borrow(book)).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref c) if c == codes::USER_ALREADY_BORROWED_THIS_BOOK));
    assert_eq!(stock(&pool, book).await, (1, true));
}

#[sqlx::test]
#[ignore]
async fn test_sixth_borrow_exceeds_limit(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;

    for i in 0..5 {
        let book = seed_book(&pool, &format!("Volume {}", i), 1, None).await;
        services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    }

    let sixth = seed_book(&pool, "Volume 5", 1, None).await;
    let err = services.borrows.create_borrow(user, borrow(sixth)).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(ref c) if c == codes::LIMIT_EXCEEDED));
    assert_eq!(stock(&pool, sixth).await, (1, true));
}

#[sqlx::test]
#[ignore]
async fn test_requested_return_date_bounds(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Ubik", 2, None).await;

    let too_far = (today() + Duration::days(15)).format("%Y-%m-%d").to_string();
    let err = services
        .borrows
        .create_borrow(user, CreateBorrow { book_id: book, return_date: Some(too_far) })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref c) if c == codes::RETURN_DATE_TOO_FAR));

    let err = services
        .borrows
        .create_borrow(user, CreateBorrow { book_id: book, return_date: Some("soon".to_string()) })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref c) if c == codes::INVALID_DATE));

    // Nothing was reserved by the failed attempts
    assert_eq!(stock(&pool, book).await, (2, true));

    let last_day = today() + Duration::days(14);
    let record = services
        .borrows
        .create_borrow(
            user,
            CreateBorrow {
                book_id: book,
                return_date: Some(last_day.format("%Y-%m-%d").to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(record.return_date, last_day);
}

#[sqlx::test]
#[ignore]
async fn test_missing_day_limit_fails_borrow(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Neuromancer", 1, None).await;

    sqlx::query("UPDATE settings SET borrow_day_limit = NULL")
        .execute(&pool)
        .await
        .unwrap();

    let err = services.borrows.create_borrow(user, borrow(book)).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(ref c) if c == codes::BORROW_LIMIT_NOT_SET));
    assert_eq!(stock(&pool, book).await, (1, true));
}

#[sqlx::test]
#[ignore]
async fn test_return_restores_copy_and_stamps_date(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Foundation", 1, None).await;
    let admin = claims(1, Role::Admin);

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    services
        .borrows
        .transition_borrow_status(&admin, record.id, "borrowed")
        .await
        .unwrap();
    assert_eq!(stock(&pool, book).await, (0, false));

    let detail = services
        .borrows
        .transition_borrow_status(&admin, record.id, "returned")
        .await
        .unwrap();

    assert_eq!(detail.record.borrow_status, BorrowStatus::Returned);
    assert_eq!(detail.record.returned_at, Some(today()));
    assert_eq!(detail.book_title, "Foundation");
    assert_eq!(detail.user_name, "ada");
    assert_eq!(stock(&pool, book).await, (1, true));

    // Same status again changes nothing
    services
        .borrows
        .transition_borrow_status(&admin, record.id, "returned")
        .await
        .unwrap();
    assert_eq!(stock(&pool, book).await, (1, true));

    // Terminal records cannot be reopened
    let err = services
        .borrows
        .transition_borrow_status(&admin, record.id, "borrowed")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref c) if c == codes::INVALID_STATUS_TRANSITION));
}

#[sqlx::test]
#[ignore]
async fn test_reject_restores_copy(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Kindred", 2, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    assert_eq!(stock(&pool, book).await, (1, true));

    services
        .borrows
        .transition_borrow_status(&claims(1, Role::Admin), record.id, "rejected")
        .await
        .unwrap();
    assert_eq!(stock(&pool, book).await, (2, true));

    // The book can be borrowed again once the previous loan ended
    services.borrows.create_borrow(user, borrow(book)).await.unwrap();
}

#[sqlx::test]
#[ignore]
async fn test_users_may_only_return_their_own_records(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let ada = seed_user(&pool, "ada").await;
    let bob = seed_user(&pool, "bob").await;
    let book = seed_book(&pool, "Lilith", 1, None).await;

    let record = services.borrows.create_borrow(ada, borrow(book)).await.unwrap();

    let err = services
        .borrows
        .transition_borrow_status(&claims(bob, Role::User), record.id, "returned")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(ref c) if c == codes::FORBIDDEN));

    let err = services
        .borrows
        .transition_borrow_status(&claims(ada, Role::User), record.id, "borrowed")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(ref c) if c == codes::FORBIDDEN));

    services
        .borrows
        .transition_borrow_status(&claims(ada, Role::User), record.id, "returned")
        .await
        .unwrap();
    assert_eq!(stock(&pool, book).await, (1, true));
}

#[sqlx::test]
#[ignore]
async fn test_request_status_leaves_copies_alone(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Beloved", 1, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    let detail = services
        .borrows
        .transition_request_status(&claims(1, Role::Admin), record.id, "accepted")
        .await
        .unwrap();

    assert_eq!(detail.record.request_status, RequestStatus::Accepted);
    assert_eq!(detail.record.borrow_status, BorrowStatus::Pending);
    assert_eq!(stock(&pool, book).await, (0, false));
}

#[sqlx::test]
#[ignore]
async fn test_extend_due_date(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Piranesi", 1, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();

    let extended = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: book, extend_days: 7 })
        .await
        .unwrap();
    assert_eq!(extended.id, record.id);
    assert_eq!(extended.return_date, record.return_date + Duration::days(7));
    assert_eq!(extended.extension_count, 1);

    let err = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: book, extend_days: 8 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref c) if c == codes::EXTENSION_NOT_ALLOWED));

    let other = seed_book(&pool, "Jonathan Strange", 1, None).await;
    let err = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: other, extend_days: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref c) if c == codes::ACTIVE_BORROW_NOT_FOUND));
}

#[sqlx::test]
#[ignore]
async fn test_overdue_reconciled_on_read_and_cleared_by_extension(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Middlemarch", 1, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    sqlx::query(
        r#"
        UPDATE borrows
        SET borrow_status = 'borrowed', request_status = 'accepted', return_date = $2
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(today() - Duration::days(2))
    .execute(&pool)
    .await
    .unwrap();

    let overdue = services
        .borrows
        .count_by(StatusFilter::borrow("overdue").unwrap(), Some(user))
        .await
        .unwrap();
    assert_eq!(overdue, 1);

    // Still active: it counts toward the limit and blocks a second copy
    let err = services.borrows.create_borrow(user, borrow(book)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let extended = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: book, extend_days: 5 })
        .await
        .unwrap();
    assert_eq!(extended.return_date, today() + Duration::days(3));
    assert_eq!(extended.borrow_status, BorrowStatus::Borrowed);

    // Reconciliation is idempotent
    assert_eq!(services.borrows.reconcile_overdue(None).await.unwrap(), 0);
}

#[sqlx::test]
#[ignore]
async fn test_extending_unapproved_overdue_request_keeps_it_pending(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Gilead", 1, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    sqlx::query("UPDATE borrows SET return_date = $2 WHERE id = $1")
        .bind(record.id)
        .bind(today() - Duration::days(1))
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(services.borrows.reconcile_overdue(Some(user)).await.unwrap(), 1);

    let extended = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: book, extend_days: 3 })
        .await
        .unwrap();
    assert_eq!(extended.borrow_status, BorrowStatus::Pending);
    assert_eq!(extended.request_status, RequestStatus::Pending);
    assert_eq!(extended.return_date, today() + Duration::days(2));
}

#[sqlx::test]
#[ignore]
async fn test_extension_past_calendar_range_is_rejected(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Austerlitz", 1, None).await;

    services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    // Written directly: the settings endpoint would refuse this limit
    sqlx::query("UPDATE settings SET borrow_day_extension_limit = $1")
        .bind(i32::MAX)
        .execute(&pool)
        .await
        .unwrap();

    let err = services
        .borrows
        .extend_due_date(user, ExtendBorrow { book_id: book, extend_days: i32::MAX })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref c) if c == codes::INVALID_DATE));
}

#[sqlx::test]
#[ignore]
async fn test_concurrent_borrows_of_last_copy(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let book = seed_book(&pool, "Stoner", 1, None).await;

    let mut users = Vec::new();
    for i in 0..6 {
        users.push(seed_user(&pool, &format!("reader{}", i)).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let services = services.clone();
            tokio::spawn(async move { services.borrows.create_borrow(user, borrow(book)).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::Conflict(ref c)) if c == codes::BOOK_UNAVAILABLE => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(stock(&pool, book).await, (0, false));
    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrows WHERE book_id = $1")
        .bind(book)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[sqlx::test]
#[ignore]
async fn test_pdf_access_is_idempotent(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Flatland", 0, Some("flatland.pdf")).await;
    let print_only = seed_book(&pool, "Emma", 1, None).await;

    let first = services.borrows.create_pdf_access(user, book).await.unwrap();
    let second = services.borrows.create_pdf_access(user, book).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.borrow_status, BorrowStatus::PdfViewed);
    assert_eq!(first.request_status, RequestStatus::Accepted);
    assert_eq!(stock(&pool, book).await, (0, false));

    let err = services.borrows.create_pdf_access(user, print_only).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref c) if c == codes::PDF_NOT_AVAILABLE));

    // Digital access does not count toward the borrow limit
    let pdf_views = services
        .borrows
        .count_by(StatusFilter::borrow("pdf-viewed").unwrap(), Some(user))
        .await
        .unwrap();
    assert_eq!(pdf_views, 1);
    services.borrows.create_borrow(user, borrow(print_only)).await.unwrap();
}

#[sqlx::test]
#[ignore]
async fn test_delete_active_record_releases_copy(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let user = seed_user(&pool, "ada").await;
    let book = seed_book(&pool, "Orlando", 1, None).await;

    let record = services.borrows.create_borrow(user, borrow(book)).await.unwrap();
    services
        .borrows
        .delete_borrow(&claims(1, Role::Admin), record.id)
        .await
        .unwrap();

    assert_eq!(stock(&pool, book).await, (1, true));
    assert!(services.borrows.list(Some(user)).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore]
async fn test_listings_are_scoped_and_enriched(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));
    let ada = seed_user(&pool, "ada").await;
    let bob = seed_user(&pool, "bob").await;
    let first = seed_book(&pool, "Erewhon", 2, None).await;
    let second = seed_book(&pool, "Walden", 2, None).await;

    services.borrows.create_borrow(ada, borrow(first)).await.unwrap();
    services.borrows.create_borrow(ada, borrow(second)).await.unwrap();
    services.borrows.create_borrow(bob, borrow(first)).await.unwrap();

    let pending = StatusFilter::request("pending").unwrap();
    assert_eq!(services.borrows.count_by(pending, Some(ada)).await.unwrap(), 2);
    assert_eq!(services.borrows.count_by(pending, None).await.unwrap(), 3);

    let mine = services.borrows.list_by(pending, Some(ada)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|d| d.record.user_id == ada && d.user_name == "ada"));
    // Newest first
    assert_eq!(mine[0].book_title, "Walden");

    // Records whose book disappeared still list, with a placeholder title
    sqlx::query("DELETE FROM books WHERE book_id = $1")
        .bind(second)
        .execute(&pool)
        .await
        .unwrap();
    let mine = services.borrows.list(Some(ada)).await.unwrap();
    assert_eq!(mine[0].book_title, "unknown");
}

#[sqlx::test]
#[ignore]
async fn test_settings_update_is_partial(pool: PgPool) {
    let services = Services::new(Repository::new(pool.clone()));

    let updated = services
        .settings
        .update_settings(bookshelf_lending::models::settings::UpdateSettings {
            borrow_max_limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.borrow_max_limit, 2);
    assert_eq!(updated.borrow_day_limit, Some(14));
    assert_eq!(updated.borrow_day_extension_limit, 7);
}
