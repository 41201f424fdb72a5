//! Borrow lifecycle service
//!
//! Loads the lending policy once per operation and hands it to the
//! repository, which runs each mutation in a single transaction. Reads that
//! report statuses reconcile overdue records first so they never show a
//! stale `borrowed` past its return date.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use validator::Validate;

use crate::{
    error::{codes, AppError, AppResult},
    models::{
        borrow::{
            BorrowDetail, BorrowRecord, BorrowStatus, CreateBorrow, ExtendBorrow, RequestStatus,
            StatusFilter,
        },
        user::UserClaims,
    },
    repository::Repository,
};

use super::settings::PolicySource;

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    policy: Arc<dyn PolicySource>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl BorrowsService {
    pub fn new(repository: Repository, policy: Arc<dyn PolicySource>) -> Self {
        Self { repository, policy }
    }

    /// Borrow a physical copy
    pub async fn create_borrow(&self, user_id: i32, request: CreateBorrow) -> AppResult<BorrowRecord> {
        let policy = self.policy.current_policy().await?;

        let record = self
            .repository
            .borrows
            .create(
                user_id,
                request.book_id,
                request.return_date.as_deref(),
                &policy,
                today(),
            )
            .await?;

        tracing::info!(
            borrow_id = record.id,
            user_id,
            book_id = record.book_id,
            return_date = %record.return_date,
            "Borrow created"
        );
        Ok(record)
    }

    /// Grant digital access to a book's PDF. Calling it again returns the
    /// same record.
    pub async fn create_pdf_access(&self, user_id: i32, book_id: i32) -> AppResult<BorrowRecord> {
        let (record, created) = self
            .repository
            .borrows
            .create_pdf_access(user_id, book_id, today())
            .await?;

        if created {
            tracing::info!(borrow_id = record.id, user_id, book_id, "PDF access granted");
        }
        Ok(record)
    }

    /// Change the borrow status of a record.
    ///
    /// Admins may apply any valid transition. Other callers may only mark
    /// their own record as returned.
    pub async fn transition_borrow_status(
        &self,
        claims: &UserClaims,
        borrow_id: i32,
        status: &str,
    ) -> AppResult<BorrowDetail> {
        let target: BorrowStatus = status
            .parse()
            .map_err(|_| AppError::bad_request(codes::INVALID_STATUS))?;

        if !claims.is_admin() {
            let record = self.repository.borrows.get_by_id(borrow_id).await?;
            if record.user_id != claims.user_id || target != BorrowStatus::Returned {
                return Err(AppError::forbidden(codes::FORBIDDEN));
            }
        }

        let (record, plan) = self
            .repository
            .borrows
            .transition_status(borrow_id, target, today())
            .await?;

        if plan.changed {
            tracing::info!(
                borrow_id,
                book_id = record.book_id,
                status = %target,
                copy_effect = ?plan.copy_effect,
                "Borrow status changed"
            );
        }

        self.repository.borrows.get_detail(borrow_id).await
    }

    /// Change the administrative approval state of a record (admin only)
    pub async fn transition_request_status(
        &self,
        claims: &UserClaims,
        borrow_id: i32,
        status: &str,
    ) -> AppResult<BorrowDetail> {
        claims.require_admin()?;

        let target: RequestStatus = status
            .parse()
            .map_err(|_| AppError::bad_request(codes::INVALID_STATUS))?;

        self.repository
            .borrows
            .update_request_status(borrow_id, target)
            .await?;
        tracing::info!(borrow_id, status = %target, "Borrow request status changed");

        self.repository.borrows.get_detail(borrow_id).await
    }

    /// Extend the due date of the caller's active borrow of a book
    pub async fn extend_due_date(&self, user_id: i32, request: ExtendBorrow) -> AppResult<BorrowRecord> {
        request.validate()?;
        let policy = self.policy.current_policy().await?;

        let record = self
            .repository
            .borrows
            .extend(user_id, request.book_id, request.extend_days, &policy, today())
            .await?;

        tracing::info!(
            borrow_id = record.id,
            user_id,
            extend_days = request.extend_days,
            return_date = %record.return_date,
            extension_count = record.extension_count,
            "Borrow extended"
        );
        Ok(record)
    }

    /// Delete a record (admin only), reversing its copy reservation
    pub async fn delete_borrow(&self, claims: &UserClaims, borrow_id: i32) -> AppResult<()> {
        claims.require_admin()?;

        let record = self.repository.borrows.delete(borrow_id).await?;
        tracing::warn!(
            borrow_id,
            book_id = record.book_id,
            status = %record.borrow_status,
            "Borrow deleted"
        );
        Ok(())
    }

    /// Relabel stale active records as overdue, for one user or everyone
    pub async fn reconcile_overdue(&self, user_id: Option<i32>) -> AppResult<u64> {
        let relabeled = self
            .repository
            .borrows
            .reconcile_overdue(user_id, today())
            .await?;

        if relabeled > 0 {
            tracing::info!(relabeled, user_id = ?user_id, "Borrows marked overdue");
        }
        Ok(relabeled)
    }

    /// All records of one user, or of everyone when `user_id` is `None`
    pub async fn list(&self, user_id: Option<i32>) -> AppResult<Vec<BorrowDetail>> {
        self.reconcile_overdue(user_id).await?;
        self.repository.borrows.list(user_id).await
    }

    /// Number of records in a status
    pub async fn count_by(&self, filter: StatusFilter, user_id: Option<i32>) -> AppResult<i64> {
        self.reconcile_overdue(user_id).await?;
        self.repository.borrows.count_by(filter, user_id).await
    }

    /// Records in a status, with book and user details
    pub async fn list_by(
        &self,
        filter: StatusFilter,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BorrowDetail>> {
        self.reconcile_overdue(user_id).await?;
        self.repository.borrows.list_by(filter, user_id).await
    }
}
