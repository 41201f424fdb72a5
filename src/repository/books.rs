//! Catalog ledger: per-book copy counts
//!
//! Every write keeps `book_availabity` equal to `available_copies > 0` in
//! the same statement.

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{codes, AppError, AppResult},
    models::book::BookStock,
};

const STOCK_COLUMNS: &str =
    "book_id, book_title, book_pdf, available_copies, book_availabity";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get the stock fields of a book
    pub async fn get_stock(&self, book_id: i32) -> AppResult<Option<BookStock>> {
        let query = format!("SELECT {} FROM books WHERE book_id = $1", STOCK_COLUMNS);
        let stock = sqlx::query_as::<_, BookStock>(&query)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    /// Read a book's stock and hold its row lock until the transaction ends
    pub async fn lock_stock(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
    ) -> AppResult<Option<BookStock>> {
        let query = format!(
            "SELECT {} FROM books WHERE book_id = $1 FOR UPDATE",
            STOCK_COLUMNS
        );
        let stock = sqlx::query_as::<_, BookStock>(&query)
            .bind(book_id)
            .fetch_optional(conn)
            .await?;
        Ok(stock)
    }

    /// Take one copy out of stock. Returns the remaining count.
    ///
    /// Fails with BOOK_UNAVAILABLE instead of going below zero.
    pub async fn take_copy(&self, conn: &mut PgConnection, book_id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1,
                book_availabity = (available_copies - 1) > 0
            WHERE book_id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(book_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::conflict(codes::BOOK_UNAVAILABLE))
    }

    /// Put one copy back into stock. Returns the new count, or `None` when
    /// the book no longer exists.
    pub async fn release_copy(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
    ) -> AppResult<Option<i32>> {
        let remaining = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1,
                book_availabity = TRUE
            WHERE book_id = $1
            RETURNING available_copies
            "#,
        )
        .bind(book_id)
        .fetch_optional(conn)
        .await?;

        if remaining.is_none() {
            tracing::warn!(book_id, "Released a copy of a book that no longer exists");
        }

        Ok(remaining)
    }
}
