//! Catalog ledger view of a book

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Stock fields of a book, as read by the lending engine
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BookStock {
    pub book_id: i32,
    pub book_title: String,
    /// Stored PDF asset, if any
    pub book_pdf: Option<String>,
    pub available_copies: i32,
    /// Mirrors `available_copies > 0`
    #[sqlx(rename = "book_availabity")]
    #[serde(rename = "book_availabity")]
    pub is_available: bool,
}

impl BookStock {
    /// A copy can be lent out
    pub fn is_borrowable(&self) -> bool {
        self.available_copies >= 1 && self.is_available
    }

    pub fn has_pdf(&self) -> bool {
        self.book_pdf
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }
}
