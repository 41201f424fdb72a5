//! Data models for Bookshelf lending

pub mod book;
pub mod borrow;
pub mod settings;
pub mod user;

// Re-export commonly used types
pub use book::BookStock;
pub use borrow::{BorrowDetail, BorrowRecord, BorrowStatus, RequestStatus, StatusFilter};
pub use settings::{BorrowPolicy, Settings};
pub use user::{Role, UserClaims};
