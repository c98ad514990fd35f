//! Transaction coordinator: serializable units of work over the ledger.
//!
//! Every multi-step financial operation runs inside a serializable
//! database transaction. Row locks on accounts are taken in ascending ID
//! order so concurrent postings touching the same accounts serialize
//! instead of deadlocking. Serialization failures surface as a retryable
//! error; the coordinator itself never retries.

use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IsolationLevel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};
use uuid::Uuid;
use keelbook_shared::types::AccountId;

use crate::entities::accounts;

/// Error type for coordinated units of work.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError<E> {
    /// The unit of work itself failed; the transaction was rolled back.
    #[error(transparent)]
    Work(E),

    /// Serialization failure or lock contention; the caller may retry.
    #[error("Concurrent modification detected, please retry")]
    Contention,

    /// Database error outside the unit of work.
    #[error("Database error: {0}")]
    Database(DbErr),
}

/// Returns true if a database error is a serialization failure or lock
/// wait problem that the caller can resolve by retrying.
#[must_use]
pub fn is_contention(err: &DbErr) -> bool {
    let text = err.to_string();
    // Postgres SQLSTATE 40001 (serialization_failure), 40P01 (deadlock
    // detected), 55P03 (lock_not_available).
    text.contains("40001")
        || text.contains("40P01")
        || text.contains("55P03")
        || text.contains("could not serialize")
        || text.contains("deadlock detected")
}

/// Coordinates multi-step financial operations.
#[derive(Debug, Clone)]
pub struct LedgerCoordinator {
    db: DatabaseConnection,
}

impl LedgerCoordinator {
    /// Creates a new coordinator over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Runs a unit of work inside a serializable transaction.
    ///
    /// The closure either commits as a whole or rolls back as a whole;
    /// no partial state is ever visible to other transactions.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Work` when the closure fails,
    /// `CoordinatorError::Contention` on serialization failures, and
    /// `CoordinatorError::Database` for other connection errors.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, CoordinatorError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            )
                -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::error::Error + Send,
    {
        let result = self
            .db
            .transaction_with_config(work, Some(IsolationLevel::Serializable), None)
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Transaction(err)) => Err(CoordinatorError::Work(err)),
            Err(TransactionError::Connection(err)) if is_contention(&err) => {
                Err(CoordinatorError::Contention)
            }
            Err(TransactionError::Connection(err)) => Err(CoordinatorError::Database(err)),
        }
    }
}

/// Loads and row-locks a set of accounts in ascending ID order.
///
/// Returns accounts in the same order they were locked. Missing IDs are
/// simply absent from the result; callers detect that by count.
///
/// # Errors
///
/// Returns an error if the lock acquisition fails.
pub async fn lock_accounts(
    txn: &DatabaseTransaction,
    account_ids: &[AccountId],
) -> Result<Vec<accounts::Model>, DbErr> {
    let mut ids: Vec<Uuid> = account_ids.iter().map(|id| id.into_inner()).collect();
    ids.sort_unstable();
    ids.dedup();

    accounts::Entity::find()
        .filter(accounts::Column::Id.is_in(ids))
        .order_by_asc(accounts::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
}

/// Loads and row-locks a single account.
///
/// # Errors
///
/// Returns an error if the lock acquisition fails.
pub async fn lock_account(
    txn: &DatabaseTransaction,
    account_id: AccountId,
) -> Result<Option<accounts::Model>, DbErr> {
    accounts::Entity::find()
        .filter(accounts::Column::Id.eq(account_id.into_inner()))
        .lock_exclusive()
        .one(txn)
        .await
}

/// Applies a signed balance change to a locked account row.
///
/// Must only be called with a model obtained via [`lock_account`] or
/// [`lock_accounts`] in the same transaction.
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn apply_balance_change(
    txn: &DatabaseTransaction,
    account: accounts::Model,
    change: Decimal,
) -> Result<accounts::Model, DbErr> {
    let new_balance = account.balance + change;
    let mut active: accounts::ActiveModel = account.into();
    active.balance = Set(new_balance);
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(txn).await
}

/// Overwrites a locked account's stored balance.
///
/// Reserved for audit repair, which recomputes the value from posting
/// history first. Normal postings go through [`apply_balance_change`].
///
/// # Errors
///
/// Returns an error if the update fails.
pub async fn set_balance(
    txn: &DatabaseTransaction,
    account: accounts::Model,
    balance: Decimal,
) -> Result<accounts::Model, DbErr> {
    let mut active: accounts::ActiveModel = account.into();
    active.balance = Set(balance);
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(txn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_detection() {
        let err = DbErr::Custom("could not serialize access due to concurrent update".to_string());
        assert!(is_contention(&err));

        let err = DbErr::Custom("SQLSTATE 40001".to_string());
        assert!(is_contention(&err));

        let err = DbErr::Custom("deadlock detected".to_string());
        assert!(is_contention(&err));

        let err = DbErr::Custom("duplicate key value violates unique constraint".to_string());
        assert!(!is_contention(&err));
    }
}
