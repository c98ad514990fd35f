//! Posting engine: validates and applies balanced journal entries.
//!
//! All writes run inside a serializable unit of work via the
//! [`LedgerCoordinator`]. Period lock, account facts, validation, line
//! insertion, and balance updates are all resolved inside the same
//! transaction, so nothing can change underneath a posting.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use keelbook_core::ledger::{
    reversal_description, reversing_lines, validate_entry, JournalEntryInput, LedgerError,
    PostedLine, PostingAccount, ResolvedLine,
};
use keelbook_shared::types::{AccountId, JournalEntryId, JournalLineId, UserId};
use keelbook_shared::AppError;

use crate::entities::{
    accounting_periods, journal_entries, journal_lines,
    sea_orm_active_enums::{EntryStatus, PeriodStatus},
};
use crate::repositories::coordinator::{
    apply_balance_change, lock_accounts, CoordinatorError, LedgerCoordinator,
};

/// Error types for posting operations.
#[derive(Debug, thiserror::Error)]
pub enum PostingError {
    /// Validation or state error from the ledger rules.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The entry was already reversed; a second reversal is refused.
    #[error("Journal entry {0} has already been reversed")]
    AlreadyReversed(JournalEntryId),

    /// Serialization failure or lock contention; the caller may retry.
    #[error("Concurrent modification detected, please retry")]
    Contention,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl PostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::AlreadyReversed(_) => "ENTRY_ALREADY_REVERSED",
            Self::Contention => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if the caller may retry the operation as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention)
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        match &err {
            PostingError::Ledger(inner) => match inner {
                LedgerError::AccountNotFound(_) | LedgerError::EntryNotFound(_) => {
                    Self::NotFound(err.to_string())
                }
                LedgerError::NoPeriodForDate(_) | LedgerError::PeriodNotOpen { .. } => {
                    Self::BusinessRule(err.to_string())
                }
                _ => Self::Validation(err.to_string()),
            },
            PostingError::AlreadyReversed(_) => Self::Conflict(err.to_string()),
            PostingError::Contention => Self::Contention(err.to_string()),
            PostingError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// A posted journal entry with its lines.
#[derive(Debug, Clone)]
pub struct PostedEntry {
    /// The entry header.
    pub entry: journal_entries::Model,
    /// The posted lines, in input order.
    pub lines: Vec<journal_lines::Model>,
}

/// Posting repository for journal entry operations.
#[derive(Debug, Clone)]
pub struct PostingRepository {
    db: DatabaseConnection,
    coordinator: LedgerCoordinator,
}

impl PostingRepository {
    /// Creates a new posting repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        let coordinator = LedgerCoordinator::new(db.clone());
        Self { db, coordinator }
    }

    /// Validates and posts a journal entry atomically.
    ///
    /// Steps, all inside one serializable transaction:
    /// 1. The entry date must fall in an open accounting period.
    /// 2. Every referenced account is row-locked in ascending ID order.
    /// 3. Core validation runs against the locked account facts.
    /// 4. Header and lines are inserted as `posted`.
    /// 5. Each locked account's balance is updated per its nature.
    ///
    /// On any failure nothing is written and every balance is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a `Ledger` error naming the violated rule, `Contention`
    /// on serialization failure, or `Database` for other failures.
    pub async fn post_journal_entry(
        &self,
        input: JournalEntryInput,
    ) -> Result<PostedEntry, PostingError> {
        let result = self
            .coordinator
            .run(move |txn| Box::pin(async move { post_entry_in_txn(txn, &input).await }))
            .await;

        let posted = flatten(result)?;
        tracing::debug!(
            entry_id = %posted.entry.id,
            total = %posted.entry.total_debit,
            lines = posted.lines.len(),
            "journal entry posted"
        );
        Ok(posted)
    }

    /// Reverses a posted entry by posting its mirror image.
    ///
    /// The reversing entry carries `reversal_of` pointing at the
    /// original, swapped debit/credit lines, and is dated `entry_date`
    /// (which must fall in an open period; reversing into a closed
    /// period is refused by the same period check as any posting).
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the original is missing, a `Ledger`
    /// error if it was never posted, and `AlreadyReversed` if a
    /// reversing entry already exists.
    pub async fn reverse_journal_entry(
        &self,
        entry_id: JournalEntryId,
        entry_date: NaiveDate,
        reason: String,
        reversed_by: UserId,
    ) -> Result<PostedEntry, PostingError> {
        let result = self
            .coordinator
            .run(move |txn| {
                Box::pin(async move {
                    reverse_entry_in_txn(txn, entry_id, entry_date, &reason, reversed_by).await
                })
            })
            .await;

        let reversal = flatten(result)?;
        tracing::info!(
            original = %entry_id,
            reversal = %reversal.entry.id,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    /// Fetches an entry with its lines.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if no such entry exists.
    pub async fn get_entry(&self, entry_id: JournalEntryId) -> Result<PostedEntry, PostingError> {
        let entry = journal_entries::Entity::find_by_id(entry_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        let lines = journal_lines::Entity::find()
            .filter(journal_lines::Column::EntryId.eq(entry_id.into_inner()))
            .order_by_asc(journal_lines::Column::LineNo)
            .all(&self.db)
            .await?;

        Ok(PostedEntry { entry, lines })
    }

    /// Lists posted entries hitting an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<journal_lines::Model>, PostingError> {
        Ok(journal_lines::Entity::find()
            .filter(journal_lines::Column::AccountId.eq(account_id.into_inner()))
            .order_by_desc(journal_lines::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}

fn flatten<T>(result: Result<T, CoordinatorError<PostingError>>) -> Result<T, PostingError> {
    match result {
        Ok(value) => Ok(value),
        Err(CoordinatorError::Work(err)) => Err(err),
        Err(CoordinatorError::Contention) => Err(PostingError::Contention),
        Err(CoordinatorError::Database(err)) => Err(PostingError::Database(err)),
    }
}

/// Asserts that an open period covers `date`.
pub(crate) async fn check_period_open(
    txn: &DatabaseTransaction,
    date: NaiveDate,
) -> Result<accounting_periods::Model, PostingError> {
    let period = accounting_periods::Entity::find()
        .filter(accounting_periods::Column::StartDate.lte(date))
        .filter(accounting_periods::Column::EndDate.gte(date))
        .one(txn)
        .await?
        .ok_or(LedgerError::NoPeriodForDate(date))?;

    if period.status != PeriodStatus::Open {
        let status: keelbook_core::period::PeriodStatus = period.status.clone().into();
        return Err(LedgerError::PeriodNotOpen {
            year: period.year,
            month: u32::try_from(period.month).unwrap_or_default(),
            status: status.to_string(),
        }
        .into());
    }

    Ok(period)
}

async fn post_entry_in_txn(
    txn: &DatabaseTransaction,
    input: &JournalEntryInput,
) -> Result<PostedEntry, PostingError> {
    check_period_open(txn, input.entry_date).await?;

    let account_ids: Vec<AccountId> = input.lines.iter().map(|l| l.account_id).collect();
    let locked = lock_accounts(txn, &account_ids).await?;

    let facts: HashMap<AccountId, PostingAccount> = locked
        .iter()
        .map(|model| {
            let id = AccountId::from_uuid(model.id);
            (
                id,
                PostingAccount {
                    id,
                    code: model.code.clone(),
                    is_group: model.is_group,
                    is_active: model.is_active,
                    is_frozen: model.is_frozen,
                    nature: model.nature.clone().into(),
                },
            )
        })
        .collect();

    let (resolved, totals) = validate_entry(input, |account_id| {
        facts
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))
    })?;

    let entry = insert_entry(txn, input, &resolved, totals.debit, totals.credit, None).await?;

    // Net the balance changes per account, then write each locked row once.
    let mut changes: HashMap<Uuid, Decimal> = HashMap::new();
    for line in &resolved {
        *changes.entry(line.account.id.into_inner()).or_default() += line.balance_change;
    }
    for model in locked {
        if let Some(change) = changes.get(&model.id) {
            apply_balance_change(txn, model, *change).await?;
        }
    }

    Ok(entry)
}

async fn reverse_entry_in_txn(
    txn: &DatabaseTransaction,
    entry_id: JournalEntryId,
    entry_date: NaiveDate,
    reason: &str,
    reversed_by: UserId,
) -> Result<PostedEntry, PostingError> {
    let original = journal_entries::Entity::find_by_id(entry_id.into_inner())
        .one(txn)
        .await?
        .ok_or(LedgerError::EntryNotFound(entry_id))?;

    let existing_reversal = journal_entries::Entity::find()
        .filter(journal_entries::Column::ReversalOf.eq(entry_id.into_inner()))
        .one(txn)
        .await?;
    if existing_reversal.is_some() {
        return Err(PostingError::AlreadyReversed(entry_id));
    }

    let original_lines = journal_lines::Entity::find()
        .filter(journal_lines::Column::EntryId.eq(entry_id.into_inner()))
        .order_by_asc(journal_lines::Column::LineNo)
        .all(txn)
        .await?;

    let posted: Vec<PostedLine> = original_lines
        .iter()
        .map(|line| PostedLine {
            account_id: AccountId::from_uuid(line.account_id),
            debit: line.debit,
            credit: line.credit,
            memo: line.memo.clone(),
        })
        .collect();

    let input = JournalEntryInput {
        entry_date,
        description: reversal_description(entry_id, reason),
        reference: original.reference.clone(),
        lines: reversing_lines(&posted),
        created_by: reversed_by,
    };

    let mut result = post_entry_in_txn(txn, &input).await?;

    // Stamp the link after the normal posting path succeeds.
    let mut active: journal_entries::ActiveModel = result.entry.into();
    active.reversal_of = Set(Some(entry_id.into_inner()));
    result.entry = active.update(txn).await?;

    Ok(result)
}

async fn insert_entry(
    txn: &DatabaseTransaction,
    input: &JournalEntryInput,
    resolved: &[ResolvedLine],
    total_debit: Decimal,
    total_credit: Decimal,
    reversal_of: Option<JournalEntryId>,
) -> Result<PostedEntry, PostingError> {
    let now: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();
    let entry_id = JournalEntryId::new();

    let entry = journal_entries::ActiveModel {
        id: Set(entry_id.into_inner()),
        entry_date: Set(input.entry_date),
        description: Set(input.description.clone()),
        reference: Set(input.reference.clone()),
        status: Set(EntryStatus::Posted),
        total_debit: Set(total_debit),
        total_credit: Set(total_credit),
        reversal_of: Set(reversal_of.map(JournalEntryId::into_inner)),
        created_by: Set(input.created_by.into_inner()),
        posted_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let entry = entry.insert(txn).await?;

    let mut lines = Vec::with_capacity(resolved.len());
    for (idx, line) in resolved.iter().enumerate() {
        let line_no = i32::try_from(idx).unwrap_or(i32::MAX) + 1;
        let model = journal_lines::ActiveModel {
            id: Set(JournalLineId::new().into_inner()),
            entry_id: Set(entry.id),
            account_id: Set(line.account.id.into_inner()),
            line_no: Set(line_no),
            debit: Set(line.debit),
            credit: Set(line.credit),
            memo: Set(line.memo.clone()),
            created_at: Set(now),
        };
        lines.push(model.insert(txn).await?);
    }

    Ok(PostedEntry { entry, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_boundary_mapping_per_variant() {
        let unbalanced: AppError = PostingError::Ledger(LedgerError::UnbalancedEntry {
            debit: dec!(100),
            credit: dec!(50),
        })
        .into();
        assert_eq!(unbalanced.status_code(), 400);

        let closed: AppError = PostingError::Ledger(LedgerError::PeriodNotOpen {
            year: 2026,
            month: 3,
            status: "closed".to_string(),
        })
        .into();
        assert_eq!(closed.status_code(), 422);

        let reversed: AppError = PostingError::AlreadyReversed(JournalEntryId::new()).into();
        assert_eq!(reversed.status_code(), 409);
        assert!(!reversed.is_retryable());

        let contention: AppError = PostingError::Contention.into();
        assert_eq!(contention.status_code(), 409);
        assert!(contention.is_retryable());
    }
}
