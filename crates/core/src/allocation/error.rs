//! Allocation error types.

use rust_decimal::Decimal;
use thiserror::Error;
use keelbook_shared::types::{AllocationId, InvoiceId, ReceiptId};

/// Errors that can occur during payment allocation.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Allocation amounts must be positive.
    #[error("Allocation amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount exceeds the invoice's outstanding balance.
    #[error(
        "Allocation of {requested} exceeds outstanding {outstanding} on invoice {invoice_id}"
    )]
    ExceedsOutstanding {
        /// The target invoice.
        invoice_id: InvoiceId,
        /// Requested allocation amount (cumulative within a batch).
        requested: Decimal,
        /// The invoice's outstanding amount before the operation.
        outstanding: Decimal,
    },

    /// Amount exceeds the receipt's unallocated remainder.
    #[error("Allocation of {requested} exceeds remaining {remaining} on receipt {receipt_id}")]
    ExceedsRemaining {
        /// The source receipt.
        receipt_id: ReceiptId,
        /// Requested allocation amount (cumulative within a batch).
        requested: Decimal,
        /// The receipt's remaining amount before the operation.
        remaining: Decimal,
    },

    /// Batch must contain at least one allocation.
    #[error("Allocation batch is empty")]
    EmptyBatch,

    /// Allocation not found.
    #[error("Allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// Allocation is already reversed; reversal is one-way.
    #[error("Allocation {0} is already reversed")]
    AlreadyReversed(AllocationId),

    /// Invoice not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Receipt not found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(ReceiptId),
}

impl AllocationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::ExceedsOutstanding { .. } => "ALLOCATION_EXCEEDS_OUTSTANDING",
            Self::ExceedsRemaining { .. } => "ALLOCATION_EXCEEDS_REMAINING",
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::AllocationNotFound(_) => "ALLOCATION_NOT_FOUND",
            Self::AlreadyReversed(_) => "ALLOCATION_ALREADY_REVERSED",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::ReceiptNotFound(_) => "RECEIPT_NOT_FOUND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AllocationError::NonPositiveAmount(dec!(0)).error_code(),
            "NON_POSITIVE_AMOUNT"
        );
        assert_eq!(
            AllocationError::EmptyBatch.error_code(),
            "EMPTY_BATCH"
        );
    }

    #[test]
    fn test_exceeds_outstanding_display() {
        let invoice_id = InvoiceId::new();
        let err = AllocationError::ExceedsOutstanding {
            invoice_id,
            requested: dec!(500),
            outstanding: dec!(400),
        };
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("400"));
        assert!(text.contains(&invoice_id.to_string()));
    }
}
