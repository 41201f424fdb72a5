//! Borrows repository: the lending engine's transactional writes and the
//! read projections over borrow records.

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{codes, AppError, AppResult},
    models::{
        borrow::{
            add_days, status_after_extension, BorrowCheck, BorrowDetail, BorrowRecord,
            BorrowStatus, CopyEffect, RequestStatus, StatusFilter, TransitionPlan, UNKNOWN,
        },
        settings::BorrowPolicy,
    },
};

use super::books::BooksRepository;

/// Advisory lock namespace serializing one user's borrow requests
const USER_BORROW_LOCK: i32 = 0x626f72;

fn active_statuses() -> Vec<&'static str> {
    BorrowStatus::ACTIVE.iter().map(|s| s.as_str()).collect()
}

fn detail_select() -> String {
    format!(
        r#"
        SELECT br.*,
               COALESCE(b.book_title, '{unknown}') AS book_title,
               COALESCE(u.user_name, '{unknown}') AS user_name,
               u.user_email
        FROM borrows br
        LEFT JOIN books b ON b.book_id = br.book_id
        LEFT JOIN users u ON u.user_id = br.user_id
        "#,
        unknown = UNKNOWN
    )
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>, books: BooksRepository) -> Self {
        Self { pool, books }
    }

    /// Get borrow record by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(codes::BORROW_NOT_FOUND))
    }

    /// Get borrow record with book and user details
    pub async fn get_detail(&self, id: i32) -> AppResult<BorrowDetail> {
        let query = format!("{} WHERE br.id = $1", detail_select());
        sqlx::query_as::<_, BorrowDetail>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(codes::BORROW_NOT_FOUND))
    }

    async fn lock_record(&self, conn: &mut PgConnection, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::not_found(codes::BORROW_NOT_FOUND))
    }

    /// Create a pending borrow and reserve one copy, in one transaction
    pub async fn create(
        &self,
        user_id: i32,
        book_id: i32,
        requested_return: Option<&str>,
        policy: &BorrowPolicy,
        today: NaiveDate,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(USER_BORROW_LOCK)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let book = self.books.lock_stock(&mut tx, book_id).await?;

        let already_borrowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrows
                WHERE user_id = $1 AND book_id = $2 AND borrow_status = ANY($3)
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(active_statuses())
        .fetch_one(&mut *tx)
        .await?;

        let active_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND borrow_status = ANY($2)",
        )
        .bind(user_id)
        .bind(active_statuses())
        .fetch_one(&mut *tx)
        .await?;

        let return_date = BorrowCheck {
            book: book.as_ref(),
            policy,
            already_borrowed,
            active_borrows,
        }
        .evaluate(requested_return, today)?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, return_date, borrow_status, request_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(today)
        .bind(return_date)
        .bind(BorrowStatus::Pending)
        .bind(RequestStatus::Pending)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::conflict(codes::USER_ALREADY_BORROWED_THIS_BOOK)
            }
            other => AppError::Database(other),
        })?;

        let remaining = self.books.take_copy(&mut tx, book_id).await?;

        tx.commit().await?;

        tracing::debug!(borrow_id = record.id, book_id, remaining, "Copy reserved");
        Ok(record)
    }

    /// Find or create the PDF access record for (user, book)
    pub async fn create_pdf_access(
        &self,
        user_id: i32,
        book_id: i32,
        today: NaiveDate,
    ) -> AppResult<(BorrowRecord, bool)> {
        let book = self
            .books
            .get_stock(book_id)
            .await?
            .ok_or_else(|| AppError::not_found(codes::BOOK_NOT_FOUND))?;

        if !book.has_pdf() {
            return Err(AppError::bad_request(codes::PDF_NOT_AVAILABLE));
        }

        let inserted = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, return_date, borrow_status, request_status)
            VALUES ($1, $2, $3, $3, $4, $5)
            ON CONFLICT (user_id, book_id) WHERE borrow_status = 'pdf-viewed' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(today)
        .bind(BorrowStatus::PdfViewed)
        .bind(RequestStatus::Accepted)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok((record, true));
        }

        let existing = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrows WHERE user_id = $1 AND book_id = $2 AND borrow_status = $3",
        )
        .bind(user_id)
        .bind(book_id)
        .bind(BorrowStatus::PdfViewed)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing, false))
    }

    /// Move a record along the borrow lifecycle, applying its copy effect
    pub async fn transition_status(
        &self,
        id: i32,
        target: BorrowStatus,
        today: NaiveDate,
    ) -> AppResult<(BorrowRecord, TransitionPlan)> {
        let mut tx = self.pool.begin().await?;

        let current = self.lock_record(&mut tx, id).await?;
        let plan = current.borrow_status.plan_transition(target)?;

        if !plan.changed {
            return Ok((current, plan));
        }

        let returned_at = if plan.stamp_returned_at {
            Some(today)
        } else {
            current.returned_at
        };

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrows
            SET borrow_status = $2, returned_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(target)
        .bind(returned_at)
        .fetch_one(&mut *tx)
        .await?;

        if plan.copy_effect == CopyEffect::Release {
            self.books.release_copy(&mut tx, record.book_id).await?;
        }

        tx.commit().await?;
        Ok((record, plan))
    }

    /// Set the administrative approval state. No copy effect.
    pub async fn update_request_status(
        &self,
        id: i32,
        status: RequestStatus,
    ) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrows
            SET request_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(codes::BORROW_NOT_FOUND))
    }

    /// Push back the due date of the user's active record for a book
    pub async fn extend(
        &self,
        user_id: i32,
        book_id: i32,
        extend_days: i32,
        policy: &BorrowPolicy,
        today: NaiveDate,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrows
            WHERE user_id = $1 AND book_id = $2 AND borrow_status = ANY($3)
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(active_statuses())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(codes::ACTIVE_BORROW_NOT_FOUND))?;

        policy.ensure_extension_allowed(extend_days)?;

        let new_return_date = add_days(current.return_date, extend_days)?;
        let status = status_after_extension(
            current.borrow_status,
            current.request_status,
            new_return_date,
            today,
        );

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrows
            SET return_date = $2,
                borrow_status = $3,
                extension_count = extension_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(new_return_date)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Delete a record, giving its copy back first if it still holds one
    pub async fn delete(&self, id: i32) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let record = self.lock_record(&mut tx, id).await?;

        if record.borrow_status.is_active() {
            self.books.release_copy(&mut tx, record.book_id).await?;
        }

        sqlx::query("DELETE FROM borrows WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Relabel active records past their return date as overdue.
    ///
    /// Idempotent. Scoped to one user when `user_id` is given.
    pub async fn reconcile_overdue(&self, user_id: Option<i32>, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE borrows
            SET borrow_status = $1, updated_at = NOW()
            WHERE borrow_status = ANY($2)
              AND return_date < $3
              AND ($4::int IS NULL OR user_id = $4)
            "#,
        )
        .bind(BorrowStatus::Overdue)
        .bind(vec![BorrowStatus::Pending.as_str(), BorrowStatus::Borrowed.as_str()])
        .bind(today)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count records with a status, optionally for one user
    pub async fn count_by(&self, filter: StatusFilter, user_id: Option<i32>) -> AppResult<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM borrows WHERE {} = $1 AND ($2::int IS NULL OR user_id = $2)",
            filter.column()
        );
        let count: i64 = sqlx::query_scalar(&query)
            .bind(filter.value())
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// List records with a status, optionally for one user, newest first
    pub async fn list_by(
        &self,
        filter: StatusFilter,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BorrowDetail>> {
        let query = format!(
            "{} WHERE br.{} = $1 AND ($2::int IS NULL OR br.user_id = $2) ORDER BY br.created_at DESC, br.id DESC",
            detail_select(),
            filter.column()
        );
        let rows = sqlx::query_as::<_, BorrowDetail>(&query)
            .bind(filter.value())
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// List all records, optionally for one user, newest first
    pub async fn list(&self, user_id: Option<i32>) -> AppResult<Vec<BorrowDetail>> {
        let query = format!(
            "{} WHERE ($1::int IS NULL OR br.user_id = $1) ORDER BY br.created_at DESC, br.id DESC",
            detail_select()
        );
        let rows = sqlx::query_as::<_, BorrowDetail>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
