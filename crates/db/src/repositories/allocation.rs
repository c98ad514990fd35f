//! Allocation engine: links receipts to outstanding invoices.
//!
//! Every write locks the invoice and receipt rows involved, recomputes
//! outstanding and remaining amounts from the full allocation history,
//! validates the caps in core logic, and then rewrites the derived
//! invoice and receipt snapshots. Derived fields are never incremented
//! in place.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use keelbook_core::allocation::{
    days_overdue, plan_auto_allocation, receipt_allocated, settle_invoice, sort_invoices,
    validate_batch, AgingBucket, AllocationError, AllocationRecord, AllocationRequest,
    AllocationState, OutstandingInvoice, SettlementOrder,
};
use keelbook_shared::types::{AllocationId, Currency, InvoiceId, Money, ReceiptId, UserId};
use keelbook_shared::AppError;

use crate::entities::{allocations, invoices, receipts};
use crate::repositories::coordinator::{CoordinatorError, LedgerCoordinator};

/// Error types for settlement operations.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Cap or state violation from the allocation rules.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Serialization failure or lock contention; the caller may retry.
    #[error("Concurrent modification detected, please retry")]
    Contention,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl SettlementError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Allocation(err) => err.error_code(),
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

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match &err {
            SettlementError::Allocation(inner) => match inner {
                AllocationError::AllocationNotFound(_)
                | AllocationError::InvoiceNotFound(_)
                | AllocationError::ReceiptNotFound(_) => Self::NotFound(err.to_string()),
                AllocationError::AlreadyReversed(_) => Self::Conflict(err.to_string()),
                _ => Self::Validation(err.to_string()),
            },
            SettlementError::Contention => Self::Contention(err.to_string()),
            SettlementError::Database(_) => Self::Database(err.to_string()),
        }
    }
}

/// Filter options for outstanding-invoice and aging queries.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    /// Filter by exact customer name.
    pub customer_name: Option<String>,
    /// Only invoices dated on or after this date.
    pub invoice_date_from: Option<NaiveDate>,
    /// Only invoices dated on or before this date.
    pub invoice_date_to: Option<NaiveDate>,
}

/// An invoice with its aging classification.
#[derive(Debug, Clone)]
pub struct AgingLine {
    /// The invoice row.
    pub invoice: invoices::Model,
    /// Whole days past the due date (zero when not yet due).
    pub days_overdue: i64,
    /// Aging bucket for reporting.
    pub bucket: AgingBucket,
}

/// Aging classification for all outstanding receivables.
#[derive(Debug, Clone)]
pub struct AgingReport {
    /// The date the classification was computed against.
    pub as_of: NaiveDate,
    /// One line per outstanding invoice, ordered by due date.
    pub lines: Vec<AgingLine>,
    /// Sum of all outstanding amounts in the functional currency.
    pub total_outstanding: Money,
}

/// Converts an allocation row into the record shape core logic consumes.
#[must_use]
pub fn to_record(model: &allocations::Model) -> AllocationRecord {
    let state = if model.is_reversed {
        AllocationState::Reversed {
            reason: model.reversal_reason.clone().unwrap_or_default(),
            at: model.reversed_at.unwrap_or(model.created_at),
            by: UserId::from_uuid(model.reversed_by.unwrap_or(model.created_by)),
        }
    } else {
        AllocationState::Active
    };
    AllocationRecord {
        id: AllocationId::from_uuid(model.id),
        receipt_id: ReceiptId::from_uuid(model.receipt_id),
        invoice_id: InvoiceId::from_uuid(model.invoice_id),
        amount: model.amount,
        state,
    }
}

/// Allocation repository for receipt-to-invoice settlement.
#[derive(Debug, Clone)]
pub struct AllocationRepository {
    db: DatabaseConnection,
    coordinator: LedgerCoordinator,
    currency: Currency,
}

impl AllocationRepository {
    /// Creates a new allocation repository reporting in US dollars.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_currency(db, Currency::Usd)
    }

    /// Creates a repository reporting in the given functional currency.
    #[must_use]
    pub fn with_currency(db: DatabaseConnection, currency: Currency) -> Self {
        let coordinator = LedgerCoordinator::new(db.clone());
        Self {
            db,
            coordinator,
            currency,
        }
    }

    /// Allocates part of a receipt to an invoice.
    ///
    /// # Errors
    ///
    /// Returns an `Allocation` error on a cap violation, `Contention`
    /// on serialization failure, or `Database` for other failures.
    pub async fn allocate(
        &self,
        request: AllocationRequest,
        created_by: UserId,
    ) -> Result<allocations::Model, SettlementError> {
        let mut rows = self.allocate_batch(vec![request], created_by).await?;
        // apply_batch returns exactly one row per request.
        rows.pop().ok_or(AllocationError::EmptyBatch.into())
    }

    /// Allocates a batch atomically.
    ///
    /// The cumulative caps are checked across the whole batch; a single
    /// violation rejects everything and no row is written.
    ///
    /// # Errors
    ///
    /// Returns the first cap violation, `Contention`, or `Database`.
    pub async fn allocate_batch(
        &self,
        requests: Vec<AllocationRequest>,
        created_by: UserId,
    ) -> Result<Vec<allocations::Model>, SettlementError> {
        let result = self
            .coordinator
            .run(move |txn| Box::pin(async move { apply_batch(txn, &requests, created_by).await }))
            .await;
        let rows = flatten(result)?;
        tracing::debug!(allocations = rows.len(), "allocation batch applied");
        Ok(rows)
    }

    /// Reverses an allocation, keeping the row for history.
    ///
    /// The invoice's paid/outstanding/status and the receipt's remaining
    /// amount are recomputed from the surviving active history.
    ///
    /// # Errors
    ///
    /// Returns `AllocationNotFound`, `AlreadyReversed`, `Contention`,
    /// or `Database`.
    pub async fn unallocate(
        &self,
        allocation_id: AllocationId,
        reason: String,
        reversed_by: UserId,
    ) -> Result<allocations::Model, SettlementError> {
        let result = self
            .coordinator
            .run(move |txn| {
                Box::pin(async move { reverse_in_txn(txn, allocation_id, &reason, reversed_by).await })
            })
            .await;
        let reversed = flatten(result)?;
        tracing::info!(allocation = %reversed.id, "allocation reversed");
        Ok(reversed)
    }

    /// Applies a receipt's remaining amount to outstanding invoices.
    ///
    /// Invoices are ordered by the chosen policy (FIFO by default) and
    /// each absorbs up to its outstanding amount until the funds run
    /// out. Returns the created allocations; an empty plan (nothing
    /// outstanding, or nothing remaining) returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptNotFound`, `Contention`, or `Database`.
    pub async fn auto_allocate(
        &self,
        receipt_id: ReceiptId,
        order: SettlementOrder,
        as_of: NaiveDate,
        created_by: UserId,
    ) -> Result<Vec<allocations::Model>, SettlementError> {
        let result = self
            .coordinator
            .run(move |txn| {
                Box::pin(async move {
                    auto_allocate_in_txn(txn, receipt_id, order, as_of, created_by).await
                })
            })
            .await;
        flatten(result)
    }

    /// Lists invoices with an outstanding balance, in settlement order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_outstanding_invoices(
        &self,
        order: SettlementOrder,
        as_of: NaiveDate,
        filter: &InvoiceFilter,
    ) -> Result<Vec<invoices::Model>, SettlementError> {
        let rows = outstanding_query(filter)
            .order_by_asc(invoices::Column::Seq)
            .all(&self.db)
            .await?;

        let mut outstanding: Vec<OutstandingInvoice> = rows.iter().map(to_outstanding).collect();
        sort_invoices(&mut outstanding, order, as_of);

        let by_id: HashMap<Uuid, invoices::Model> =
            rows.into_iter().map(|m| (m.id, m)).collect();
        Ok(outstanding
            .into_iter()
            .filter_map(|o| by_id.get(&o.id.into_inner()).cloned())
            .collect())
    }

    /// Classifies outstanding invoices into aging buckets as of a date.
    ///
    /// Classification only; no invoice state is mutated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_aging(
        &self,
        as_of: NaiveDate,
        filter: &InvoiceFilter,
    ) -> Result<AgingReport, SettlementError> {
        let rows = outstanding_query(filter)
            .order_by_asc(invoices::Column::DueDate)
            .all(&self.db)
            .await?;

        let total: Decimal = rows.iter().map(|m| m.outstanding_amount).sum();
        let lines = rows
            .into_iter()
            .map(|invoice| {
                let days = days_overdue(as_of, invoice.due_date);
                AgingLine {
                    invoice,
                    days_overdue: days,
                    bucket: AgingBucket::for_days(days),
                }
            })
            .collect();

        Ok(AgingReport {
            as_of,
            lines,
            total_outstanding: Money::new(total, self.currency),
        })
    }

    /// Lists an invoice's full allocation history, reversed rows included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_allocations_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<allocations::Model>, SettlementError> {
        Ok(allocations::Entity::find()
            .filter(allocations::Column::InvoiceId.eq(invoice_id.into_inner()))
            .order_by_asc(allocations::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}

fn flatten<T>(result: Result<T, CoordinatorError<SettlementError>>) -> Result<T, SettlementError> {
    match result {
        Ok(value) => Ok(value),
        Err(CoordinatorError::Work(err)) => Err(err),
        Err(CoordinatorError::Contention) => Err(SettlementError::Contention),
        Err(CoordinatorError::Database(err)) => Err(SettlementError::Database(err)),
    }
}

/// Builds the outstanding-invoice query with the caller's filters applied.
fn outstanding_query(filter: &InvoiceFilter) -> Select<invoices::Entity> {
    let mut query = invoices::Entity::find()
        .filter(invoices::Column::OutstandingAmount.gt(Decimal::ZERO));
    if let Some(name) = &filter.customer_name {
        query = query.filter(invoices::Column::CustomerName.eq(name));
    }
    if let Some(from) = filter.invoice_date_from {
        query = query.filter(invoices::Column::InvoiceDate.gte(from));
    }
    if let Some(to) = filter.invoice_date_to {
        query = query.filter(invoices::Column::InvoiceDate.lte(to));
    }
    query
}

fn to_outstanding(model: &invoices::Model) -> OutstandingInvoice {
    OutstandingInvoice {
        id: InvoiceId::from_uuid(model.id),
        invoice_date: model.invoice_date,
        due_date: model.due_date,
        outstanding: model.outstanding_amount,
        seq: model.seq,
    }
}

/// Locks invoice rows in ascending ID order.
async fn lock_invoices(
    txn: &DatabaseTransaction,
    ids: &[InvoiceId],
) -> Result<Vec<invoices::Model>, DbErr> {
    let mut uuids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
    uuids.sort_unstable();
    uuids.dedup();

    invoices::Entity::find()
        .filter(invoices::Column::Id.is_in(uuids))
        .order_by_asc(invoices::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
}

/// Locks receipt rows in ascending ID order.
async fn lock_receipts(
    txn: &DatabaseTransaction,
    ids: &[ReceiptId],
) -> Result<Vec<receipts::Model>, DbErr> {
    let mut uuids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
    uuids.sort_unstable();
    uuids.dedup();

    receipts::Entity::find()
        .filter(receipts::Column::Id.is_in(uuids))
        .order_by_asc(receipts::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
}

async fn load_invoice_history(
    txn: &DatabaseTransaction,
    invoice_id: Uuid,
) -> Result<Vec<AllocationRecord>, DbErr> {
    let rows = allocations::Entity::find()
        .filter(allocations::Column::InvoiceId.eq(invoice_id))
        .all(txn)
        .await?;
    Ok(rows.iter().map(to_record).collect())
}

async fn load_receipt_history(
    txn: &DatabaseTransaction,
    receipt_id: Uuid,
) -> Result<Vec<AllocationRecord>, DbErr> {
    let rows = allocations::Entity::find()
        .filter(allocations::Column::ReceiptId.eq(receipt_id))
        .all(txn)
        .await?;
    Ok(rows.iter().map(to_record).collect())
}

/// Recomputes and persists an invoice's derived settlement snapshot.
pub(crate) async fn recompute_invoice(
    txn: &DatabaseTransaction,
    invoice: invoices::Model,
) -> Result<invoices::Model, DbErr> {
    let history = load_invoice_history(txn, invoice.id).await?;
    let settlement = settle_invoice(invoice.total, &history);

    let mut active: invoices::ActiveModel = invoice.into();
    active.paid_amount = Set(settlement.paid_amount);
    active.outstanding_amount = Set(settlement.outstanding_amount);
    active.status = Set(settlement.status.into());
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(txn).await
}

/// Recomputes and persists a receipt's remaining amount.
pub(crate) async fn recompute_receipt(
    txn: &DatabaseTransaction,
    receipt: receipts::Model,
) -> Result<receipts::Model, DbErr> {
    let history = load_receipt_history(txn, receipt.id).await?;
    let remaining = (receipt.amount - receipt_allocated(&history)).max(Decimal::ZERO);

    let mut active: receipts::ActiveModel = receipt.into();
    active.remaining_amount = Set(remaining);
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(txn).await
}

async fn apply_batch(
    txn: &DatabaseTransaction,
    requests: &[AllocationRequest],
    created_by: UserId,
) -> Result<Vec<allocations::Model>, SettlementError> {
    if requests.is_empty() {
        return Err(AllocationError::EmptyBatch.into());
    }

    let invoice_ids: Vec<InvoiceId> = requests.iter().map(|r| r.invoice_id).collect();
    let receipt_ids: Vec<ReceiptId> = requests.iter().map(|r| r.receipt_id).collect();

    let locked_invoices = lock_invoices(txn, &invoice_ids).await?;
    let locked_receipts = lock_receipts(txn, &receipt_ids).await?;

    for id in &invoice_ids {
        if !locked_invoices.iter().any(|m| m.id == id.into_inner()) {
            return Err(AllocationError::InvoiceNotFound(*id).into());
        }
    }
    for id in &receipt_ids {
        if !locked_receipts.iter().any(|m| m.id == id.into_inner()) {
            return Err(AllocationError::ReceiptNotFound(*id).into());
        }
    }

    // Recompute caps from history under lock; stored snapshots are not
    // trusted for validation.
    let mut invoice_outstanding: HashMap<InvoiceId, Decimal> = HashMap::new();
    for invoice in &locked_invoices {
        let history = load_invoice_history(txn, invoice.id).await?;
        let settlement = settle_invoice(invoice.total, &history);
        invoice_outstanding.insert(
            InvoiceId::from_uuid(invoice.id),
            settlement.outstanding_amount,
        );
    }

    let mut receipt_remaining: HashMap<ReceiptId, Decimal> = HashMap::new();
    for receipt in &locked_receipts {
        let history = load_receipt_history(txn, receipt.id).await?;
        let remaining = (receipt.amount - receipt_allocated(&history)).max(Decimal::ZERO);
        receipt_remaining.insert(ReceiptId::from_uuid(receipt.id), remaining);
    }

    validate_batch(requests, &invoice_outstanding, &receipt_remaining)?;

    let now: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();
    let mut rows = Vec::with_capacity(requests.len());
    for request in requests {
        let row = allocations::ActiveModel {
            id: Set(AllocationId::new().into_inner()),
            receipt_id: Set(request.receipt_id.into_inner()),
            invoice_id: Set(request.invoice_id.into_inner()),
            amount: Set(request.amount),
            notes: Set(request.notes.clone()),
            is_reversed: Set(false),
            reversal_reason: Set(None),
            reversed_at: Set(None),
            reversed_by: Set(None),
            created_by: Set(created_by.into_inner()),
            created_at: Set(now),
        };
        rows.push(row.insert(txn).await?);
    }

    for invoice in locked_invoices {
        recompute_invoice(txn, invoice).await?;
    }
    for receipt in locked_receipts {
        recompute_receipt(txn, receipt).await?;
    }

    Ok(rows)
}

async fn reverse_in_txn(
    txn: &DatabaseTransaction,
    allocation_id: AllocationId,
    reason: &str,
    reversed_by: UserId,
) -> Result<allocations::Model, SettlementError> {
    let allocation = allocations::Entity::find_by_id(allocation_id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(AllocationError::AllocationNotFound(allocation_id))?;

    if allocation.is_reversed {
        return Err(AllocationError::AlreadyReversed(allocation_id).into());
    }

    let invoice = lock_invoices(txn, &[InvoiceId::from_uuid(allocation.invoice_id)])
        .await?
        .pop()
        .ok_or(AllocationError::InvoiceNotFound(InvoiceId::from_uuid(
            allocation.invoice_id,
        )))?;
    let receipt = lock_receipts(txn, &[ReceiptId::from_uuid(allocation.receipt_id)])
        .await?
        .pop()
        .ok_or(AllocationError::ReceiptNotFound(ReceiptId::from_uuid(
            allocation.receipt_id,
        )))?;

    let now: chrono::DateTime<chrono::FixedOffset> = chrono::Utc::now().into();
    let mut active: allocations::ActiveModel = allocation.into();
    active.is_reversed = Set(true);
    active.reversal_reason = Set(Some(reason.to_string()));
    active.reversed_at = Set(Some(now));
    active.reversed_by = Set(Some(reversed_by.into_inner()));
    let reversed = active.update(txn).await?;

    recompute_invoice(txn, invoice).await?;
    recompute_receipt(txn, receipt).await?;

    Ok(reversed)
}

async fn auto_allocate_in_txn(
    txn: &DatabaseTransaction,
    receipt_id: ReceiptId,
    order: SettlementOrder,
    as_of: NaiveDate,
    created_by: UserId,
) -> Result<Vec<allocations::Model>, SettlementError> {
    // Same global lock order as apply_batch: invoices first, then the
    // receipt, so concurrent settlements never wait on each other in
    // opposite orders.
    let candidates = invoices::Entity::find()
        .filter(invoices::Column::OutstandingAmount.gt(Decimal::ZERO))
        .order_by_asc(invoices::Column::Seq)
        .all(txn)
        .await?;
    let candidate_ids: Vec<InvoiceId> =
        candidates.iter().map(|m| InvoiceId::from_uuid(m.id)).collect();
    let locked = lock_invoices(txn, &candidate_ids).await?;

    let receipt = lock_receipts(txn, &[receipt_id])
        .await?
        .pop()
        .ok_or(AllocationError::ReceiptNotFound(receipt_id))?;

    let history = load_receipt_history(txn, receipt.id).await?;
    let remaining = (receipt.amount - receipt_allocated(&history)).max(Decimal::ZERO);
    if remaining <= Decimal::ZERO {
        return Ok(Vec::new());
    }

    let mut outstanding: Vec<OutstandingInvoice> = locked
        .iter()
        .filter(|m| m.outstanding_amount > Decimal::ZERO)
        .map(to_outstanding)
        .collect();
    sort_invoices(&mut outstanding, order, as_of);

    let plan = plan_auto_allocation(remaining, &outstanding);
    if plan.is_empty() {
        return Ok(Vec::new());
    }

    let requests: Vec<AllocationRequest> = plan
        .into_iter()
        .map(|planned| AllocationRequest {
            invoice_id: planned.invoice_id,
            receipt_id,
            amount: planned.amount,
            notes: None,
        })
        .collect();

    apply_batch(txn, &requests, created_by).await
}
