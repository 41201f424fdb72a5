//! Borrow model, status axes and lending rules

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{codes, AppError, AppResult};

use super::book::BookStock;
use super::settings::BorrowPolicy;

/// Placeholder for enriched fields whose row is gone
pub const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// BorrowStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a borrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BorrowStatus {
    Pending,
    Borrowed,
    PdfViewed,
    Returned,
    Overdue,
    Rejected,
}

impl BorrowStatus {
    pub const ACTIVE: [BorrowStatus; 3] =
        [BorrowStatus::Pending, BorrowStatus::Borrowed, BorrowStatus::Overdue];

    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "pending",
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::PdfViewed => "pdf-viewed",
            BorrowStatus::Returned => "returned",
            BorrowStatus::Overdue => "overdue",
            BorrowStatus::Rejected => "rejected",
        }
    }

    /// Active records hold a physical copy
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Work out what moving from `self` to `target` does to the ledger.
    ///
    /// Leaving the active set towards `returned` or `rejected` gives the
    /// reserved copy back. Terminal records and PDF access records cannot
    /// move, and an active record cannot become a PDF access record.
    pub fn plan_transition(self, target: BorrowStatus) -> AppResult<TransitionPlan> {
        if self == target {
            return Ok(TransitionPlan::unchanged());
        }

        if !self.is_active() || target == BorrowStatus::PdfViewed {
            return Err(AppError::conflict(codes::INVALID_STATUS_TRANSITION));
        }

        Ok(match target {
            BorrowStatus::Returned => TransitionPlan {
                changed: true,
                copy_effect: CopyEffect::Release,
                stamp_returned_at: true,
            },
            BorrowStatus::Rejected => TransitionPlan {
                changed: true,
                copy_effect: CopyEffect::Release,
                stamp_returned_at: false,
            },
            _ => TransitionPlan {
                changed: true,
                copy_effect: CopyEffect::None,
                stamp_returned_at: false,
            },
        })
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(BorrowStatus::Pending),
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "pdf-viewed" => Ok(BorrowStatus::PdfViewed),
            "returned" => Ok(BorrowStatus::Returned),
            "overdue" => Ok(BorrowStatus::Overdue),
            "rejected" => Ok(BorrowStatus::Rejected),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Administrative approval state, independent from the borrow lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for RequestStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for RequestStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for RequestStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// Status filter (query layer)
// ---------------------------------------------------------------------------

/// One value on one of the two status axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Borrow(BorrowStatus),
    Request(RequestStatus),
}

impl StatusFilter {
    pub fn borrow(raw: &str) -> AppResult<Self> {
        raw.parse()
            .map(StatusFilter::Borrow)
            .map_err(|_| AppError::bad_request(codes::INVALID_STATUS))
    }

    pub fn request(raw: &str) -> AppResult<Self> {
        raw.parse()
            .map(StatusFilter::Request)
            .map_err(|_| AppError::bad_request(codes::INVALID_STATUS))
    }

    /// Column the filter applies to. Never user-controlled.
    pub fn column(&self) -> &'static str {
        match self {
            StatusFilter::Borrow(_) => "borrow_status",
            StatusFilter::Request(_) => "request_status",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            StatusFilter::Borrow(s) => s.as_str(),
            StatusFilter::Request(s) => s.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Borrow record as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: NaiveDate,
    /// Due date
    pub return_date: NaiveDate,
    pub borrow_status: BorrowStatus,
    pub request_status: RequestStatus,
    /// Set when the record is marked returned
    pub returned_at: Option<NaiveDate>,
    pub extension_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrow record joined with book and user details at read time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: BorrowRecord,
    /// Book title, or "unknown" when the book row is gone
    pub book_title: String,
    /// User name, or "unknown" when the user row is gone
    pub user_name: String,
    pub user_email: Option<String>,
}

/// Count of records matching a status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BorrowCount {
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrow {
    pub book_id: i32,
    /// Requested return date (YYYY-MM-DD), defaults to today + borrow day limit
    pub return_date: Option<String>,
}

/// Due date extension request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExtendBorrow {
    pub book_id: i32,
    #[validate(range(min = 1, message = "extend_days must be at least 1"))]
    pub extend_days: i32,
}

/// Status change request, the status is validated against the target axis
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatus {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// What a status transition does to the book's copy count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEffect {
    None,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub changed: bool,
    pub copy_effect: CopyEffect,
    pub stamp_returned_at: bool,
}

impl TransitionPlan {
    fn unchanged() -> Self {
        Self {
            changed: false,
            copy_effect: CopyEffect::None,
            stamp_returned_at: false,
        }
    }
}

/// Snapshot gathered (under lock) before a borrow is created
#[derive(Debug)]
pub struct BorrowCheck<'a> {
    pub book: Option<&'a BookStock>,
    pub policy: &'a BorrowPolicy,
    /// Whether the user already holds an active record for this book
    pub already_borrowed: bool,
    /// Active records currently held by the user
    pub active_borrows: i64,
}

impl BorrowCheck<'_> {
    /// Run the borrow preconditions in order and return the due date.
    ///
    /// The first failing rule wins.
    pub fn evaluate(&self, requested_return: Option<&str>, today: NaiveDate) -> AppResult<NaiveDate> {
        let book = self.book.ok_or_else(|| AppError::not_found(codes::BOOK_NOT_FOUND))?;

        if !book.is_borrowable() {
            return Err(AppError::conflict(codes::BOOK_UNAVAILABLE));
        }

        let day_limit = self.policy.day_limit()?;

        if self.already_borrowed {
            return Err(AppError::conflict(codes::USER_ALREADY_BORROWED_THIS_BOOK));
        }

        if self.active_borrows >= i64::from(self.policy.borrow_max_limit) {
            return Err(AppError::conflict(codes::LIMIT_EXCEEDED));
        }

        resolve_return_date(requested_return, today, day_limit)
    }
}

/// Parse and bound a requested return date, or compute the default one
pub fn resolve_return_date(
    requested: Option<&str>,
    today: NaiveDate,
    day_limit: i32,
) -> AppResult<NaiveDate> {
    let latest = add_days(today, day_limit)?;

    let Some(raw) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(latest);
    };

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(codes::INVALID_DATE))?;

    if date < today {
        return Err(AppError::bad_request(codes::INVALID_DATE));
    }
    if date > latest {
        return Err(AppError::bad_request(codes::RETURN_DATE_TOO_FAR));
    }

    Ok(date)
}

/// `date` moved forward by `days`, or INVALID_DATE when the result leaves
/// the calendar range
pub fn add_days(date: NaiveDate, days: i32) -> AppResult<NaiveDate> {
    date.checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| AppError::bad_request(codes::INVALID_DATE))
}

/// Status after pushing the due date of an active record out to
/// `new_return_date`.
///
/// An overdue record back within its due date returns to where it was
/// before it went overdue: `borrowed` once the request was accepted,
/// `pending` otherwise.
pub fn status_after_extension(
    current: BorrowStatus,
    request: RequestStatus,
    new_return_date: NaiveDate,
    today: NaiveDate,
) -> BorrowStatus {
    if current != BorrowStatus::Overdue || new_return_date < today {
        return current;
    }

    match request {
        RequestStatus::Accepted => BorrowStatus::Borrowed,
        _ => BorrowStatus::Pending,
    }
}
