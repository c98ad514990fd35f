//! Integrity auditor: recomputes derived state from immutable history.
//!
//! The audit sweep reads stored snapshots (account balances, invoice
//! paid/outstanding/status) and independently re-derives them from the
//! posting and allocation history. Mismatches are returned as data;
//! nothing is mutated unless an explicit repair is invoked, and repair
//! goes through the same locked recomputation paths as normal writes.

use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};
use rust_decimal::Decimal;
use keelbook_core::allocation::{settle_invoice, InvoiceSettlement};
use keelbook_core::audit::{compare_balance, compare_invoice, AuditReport};
use keelbook_shared::types::{AccountId, InvoiceId};
use keelbook_shared::AppError;

use crate::entities::{accounts, allocations, invoices, journal_lines};
use crate::repositories::allocation::{recompute_invoice, to_record};
use crate::repositories::coordinator::{
    is_contention, lock_account, set_balance, CoordinatorError, LedgerCoordinator,
};

/// Error types for audit operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Invoice not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Serialization failure or lock contention; the caller may retry.
    #[error("Concurrent modification detected, please retry")]
    Contention,

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for AuditError {
    fn from(err: DbErr) -> Self {
        if is_contention(&err) {
            Self::Contention
        } else {
            Self::Database(err)
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match &err {
            AuditError::AccountNotFound(_) | AuditError::InvoiceNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            AuditError::Contention => Self::Contention(err.to_string()),
            AuditError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// Integrity audit repository.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
    coordinator: LedgerCoordinator,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        let coordinator = LedgerCoordinator::new(db.clone());
        Self { db, coordinator }
    }

    /// Recomputes an account's balance from its posting history.
    ///
    /// Does not mutate anything; compare against the stored balance to
    /// detect drift.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or a database error.
    pub async fn recompute_account_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Decimal, AuditError> {
        let account = accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AuditError::AccountNotFound(account_id))?;

        recompute_balance(&self.db, &account).await
    }

    /// Recomputes an invoice's settlement figures from its allocation
    /// history, without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound` or a database error.
    pub async fn recompute_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceSettlement, AuditError> {
        let invoice = invoices::Entity::find_by_id(invoice_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AuditError::InvoiceNotFound(invoice_id))?;

        let history = allocations::Entity::find()
            .filter(allocations::Column::InvoiceId.eq(invoice.id))
            .all(&self.db)
            .await?;
        let records: Vec<_> = history.iter().map(to_record).collect();

        Ok(settle_invoice(invoice.total, &records))
    }

    /// Sweeps every account and invoice and reports drift.
    ///
    /// Read-only. Mismatches describe pre-existing drift, not a failed
    /// operation, so they are returned as data rather than errors.
    ///
    /// # Errors
    ///
    /// Returns a database error if any read fails.
    pub async fn audit_all(&self) -> Result<AuditReport, AuditError> {
        let mut report = AuditReport::default();

        let account_rows = accounts::Entity::find()
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?;
        report.accounts_checked = account_rows.len();

        for account in &account_rows {
            let recomputed = recompute_balance(&self.db, account).await?;
            if let Some(mismatch) = compare_balance(
                AccountId::from_uuid(account.id),
                &account.code,
                account.balance,
                recomputed,
            ) {
                report.balance_mismatches.push(mismatch);
            }
        }

        let invoice_rows = invoices::Entity::find()
            .order_by_asc(invoices::Column::Seq)
            .all(&self.db)
            .await?;
        report.invoices_checked = invoice_rows.len();

        for invoice in &invoice_rows {
            let history = allocations::Entity::find()
                .filter(allocations::Column::InvoiceId.eq(invoice.id))
                .all(&self.db)
                .await?;
            let records: Vec<_> = history.iter().map(to_record).collect();
            let settlement = settle_invoice(invoice.total, &records);

            if let Some(mismatch) = compare_invoice(
                InvoiceId::from_uuid(invoice.id),
                invoice.paid_amount,
                invoice.status.clone().into(),
                settlement.paid_amount,
                settlement.status,
            ) {
                report.invoice_mismatches.push(mismatch);
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                balance_mismatches = report.balance_mismatches.len(),
                invoice_mismatches = report.invoice_mismatches.len(),
                "integrity audit found drift"
            );
        }

        Ok(report)
    }

    /// Repairs a drifted account balance.
    ///
    /// Locks the account row, recomputes the balance from history inside
    /// the same transaction, and writes the recomputed value. This is
    /// the only path that overwrites a stored balance directly.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`, `Contention`, or `Database`.
    pub async fn repair_account_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Decimal, AuditError> {
        let result = self
            .coordinator
            .run(move |txn| Box::pin(async move { repair_balance_in_txn(txn, account_id).await }))
            .await;

        match result {
            Ok(balance) => Ok(balance),
            Err(CoordinatorError::Work(err)) => Err(err),
            Err(CoordinatorError::Contention) => Err(AuditError::Contention),
            Err(CoordinatorError::Database(err)) => Err(err.into()),
        }
    }

    /// Repairs a drifted invoice snapshot via the normal allocation
    /// recomputation path.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound`, `Contention`, or `Database`.
    pub async fn repair_invoice(&self, invoice_id: InvoiceId) -> Result<(), AuditError> {
        let result = self
            .coordinator
            .run(move |txn| {
                Box::pin(async move {
                    let invoice = invoices::Entity::find_by_id(invoice_id.into_inner())
                        .one(txn)
                        .await?
                        .ok_or(AuditError::InvoiceNotFound(invoice_id))?;
                    recompute_invoice(txn, invoice).await?;
                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CoordinatorError::Work(err)) => Err(err),
            Err(CoordinatorError::Contention) => Err(AuditError::Contention),
            Err(CoordinatorError::Database(err)) => Err(err.into()),
        }
    }
}

/// Recomputes a balance as the opening balance plus the signed sum of
/// all posted lines, per the account's nature.
async fn recompute_balance<C>(conn: &C, account: &accounts::Model) -> Result<Decimal, AuditError>
where
    C: sea_orm::ConnectionTrait,
{
    let lines = journal_lines::Entity::find()
        .filter(journal_lines::Column::AccountId.eq(account.id))
        .all(conn)
        .await?;

    let nature: keelbook_core::account::AccountNature = account.nature.clone().into();
    let posted: Decimal = lines
        .iter()
        .map(|line| nature.balance_change(line.debit, line.credit))
        .sum();
    Ok(account.opening_balance + posted)
}

async fn repair_balance_in_txn(
    txn: &DatabaseTransaction,
    account_id: AccountId,
) -> Result<Decimal, AuditError> {
    let account = lock_account(txn, account_id)
        .await?
        .ok_or(AuditError::AccountNotFound(account_id))?;

    let recomputed = recompute_balance(txn, &account).await?;
    set_balance(txn, account, recomputed).await?;
    Ok(recomputed)
}
