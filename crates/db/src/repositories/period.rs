//! Accounting period repository.
//!
//! Periods are calendar months. The posting engine consults the period
//! status before committing any entry; this repository only manages the
//! lifecycle itself.

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use keelbook_core::period::{month_bounds, PeriodError, PeriodStatus as CorePeriodStatus};
use keelbook_shared::types::{PeriodId, UserId};
use keelbook_shared::AppError;

use crate::entities::{accounting_periods, sea_orm_active_enums::PeriodStatus};

/// Error types for period operations.
#[derive(Debug, thiserror::Error)]
pub enum PeriodRepoError {
    /// State machine or validation error.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl PeriodRepoError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Period(err) => err.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<PeriodRepoError> for AppError {
    fn from(err: PeriodRepoError) -> Self {
        match &err {
            PeriodRepoError::Period(inner) => match inner {
                PeriodError::PeriodNotFound => Self::NotFound(err.to_string()),
                PeriodError::PeriodExists { .. } => Self::Conflict(err.to_string()),
                PeriodError::InvalidMonth(_) => Self::Validation(err.to_string()),
                PeriodError::InvalidTransition { .. } => Self::BusinessRule(err.to_string()),
            },
            PeriodRepoError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// Accounting period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an open period for a calendar month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonth` for months outside 1-12 and
    /// `PeriodExists` when the month already has a period.
    pub async fn create_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<accounting_periods::Model, PeriodRepoError> {
        let (start_date, end_date) = month_bounds(year, month)?;

        let existing = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::Year.eq(year))
            .filter(accounting_periods::Column::Month.eq(i32::try_from(month).unwrap_or_default()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(PeriodError::PeriodExists { year, month }.into());
        }

        let now = chrono::Utc::now().into();
        let period = accounting_periods::ActiveModel {
            id: Set(PeriodId::new().into_inner()),
            year: Set(year),
            month: Set(i32::try_from(month).unwrap_or_default()),
            start_date: Set(start_date),
            end_date: Set(end_date),
            status: Set(PeriodStatus::Open),
            closed_by: Set(None),
            closed_at: Set(None),
            archived_by: Set(None),
            archived_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(period.insert(&self.db).await?)
    }

    /// Closes an open period, recording who closed it and when.
    ///
    /// After closing, the posting engine rejects entries dated inside
    /// the period until it is reopened.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` or `InvalidTransition`.
    pub async fn close_period(
        &self,
        period_id: PeriodId,
        closed_by: UserId,
    ) -> Result<accounting_periods::Model, PeriodRepoError> {
        let period = self.require_period(period_id).await?;
        check_transition(&period, CorePeriodStatus::Closed)?;

        let now = chrono::Utc::now().into();
        let mut active: accounting_periods::ActiveModel = period.into();
        active.status = Set(PeriodStatus::Closed);
        active.closed_by = Set(Some(closed_by.into_inner()));
        active.closed_at = Set(Some(now));
        active.updated_at = Set(now);

        let closed = active.update(&self.db).await?;
        tracing::info!(year = closed.year, month = closed.month, "accounting period closed");
        Ok(closed)
    }

    /// Reopens a closed period, clearing the closure metadata.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` or `InvalidTransition` (archived
    /// periods never reopen).
    pub async fn reopen_period(
        &self,
        period_id: PeriodId,
    ) -> Result<accounting_periods::Model, PeriodRepoError> {
        let period = self.require_period(period_id).await?;
        check_transition(&period, CorePeriodStatus::Open)?;

        let mut active: accounting_periods::ActiveModel = period.into();
        active.status = Set(PeriodStatus::Open);
        active.closed_by = Set(None);
        active.closed_at = Set(None);
        active.updated_at = Set(chrono::Utc::now().into());

        Ok(active.update(&self.db).await?)
    }

    /// Archives a closed period. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns `PeriodNotFound` or `InvalidTransition`.
    pub async fn archive_period(
        &self,
        period_id: PeriodId,
        archived_by: UserId,
    ) -> Result<accounting_periods::Model, PeriodRepoError> {
        let period = self.require_period(period_id).await?;
        check_transition(&period, CorePeriodStatus::Archived)?;

        let now = chrono::Utc::now().into();
        let mut active: accounting_periods::ActiveModel = period.into();
        active.status = Set(PeriodStatus::Archived);
        active.archived_by = Set(Some(archived_by.into_inner()));
        active.archived_at = Set(Some(now));
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    /// Returns the period containing today's date, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_current_period(
        &self,
    ) -> Result<Option<accounting_periods::Model>, PeriodRepoError> {
        let today = chrono::Utc::now().date_naive();
        self.find_period_for_date(today).await
    }

    /// Finds the period containing a date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_period_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<accounting_periods::Model>, PeriodRepoError> {
        Ok(accounting_periods::Entity::find()
            .filter(accounting_periods::Column::StartDate.lte(date))
            .filter(accounting_periods::Column::EndDate.gte(date))
            .one(&self.db)
            .await?)
    }

    /// Lists all periods, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_periods(&self) -> Result<Vec<accounting_periods::Model>, PeriodRepoError> {
        Ok(accounting_periods::Entity::find()
            .order_by_desc(accounting_periods::Column::Year)
            .order_by_desc(accounting_periods::Column::Month)
            .all(&self.db)
            .await?)
    }

    async fn require_period(
        &self,
        period_id: PeriodId,
    ) -> Result<accounting_periods::Model, PeriodRepoError> {
        accounting_periods::Entity::find_by_id(period_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| PeriodError::PeriodNotFound.into())
    }
}

fn check_transition(
    period: &accounting_periods::Model,
    to: CorePeriodStatus,
) -> Result<(), PeriodError> {
    let from: CorePeriodStatus = period.status.clone().into();
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PeriodError::InvalidTransition { from, to })
    }
}
