//! Allocation domain types.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::{AllocationId, InvoiceId, ReceiptId, UserId};

use crate::ledger::balance_tolerance;

/// Invoice settlement status.
///
/// A pure function of `paid_amount` and `outstanding_amount`:
/// unpaid if nothing is paid, paid once outstanding is within the 0.01
/// tolerance of zero, partially paid in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// No payment applied.
    Unpaid,
    /// Some but not all of the total is settled.
    PartiallyPaid,
    /// Outstanding is zero (within tolerance).
    Paid,
}

impl InvoiceStatus {
    /// Derives the status from paid and total amounts.
    #[must_use]
    pub fn derive(paid: Decimal, total: Decimal) -> Self {
        let outstanding = (total - paid).max(Decimal::ZERO);
        if outstanding <= balance_tolerance() {
            Self::Paid
        } else if paid > Decimal::ZERO {
            Self::PartiallyPaid
        } else {
            Self::Unpaid
        }
    }
}

/// Whether an allocation is live or has been reversed.
///
/// Reversal is append-only: the row survives with reversal metadata so
/// audit history and recomputation stay correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AllocationState {
    /// The allocation counts toward paid/allocated sums.
    Active,
    /// The allocation has been reversed and is kept for history only.
    Reversed {
        /// Why the allocation was reversed.
        reason: String,
        /// When it was reversed.
        at: DateTime<FixedOffset>,
        /// Who reversed it.
        by: UserId,
    },
}

impl AllocationState {
    /// Returns true if the allocation still counts toward sums.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A recorded settlement link between a receipt and an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// The allocation ID.
    pub id: AllocationId,
    /// The receipt the money came from.
    pub receipt_id: ReceiptId,
    /// The invoice being settled.
    pub invoice_id: InvoiceId,
    /// The allocated amount (always positive).
    pub amount: Decimal,
    /// Live or reversed.
    pub state: AllocationState,
}

/// Derived invoice settlement figures, recomputed from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSettlement {
    /// Sum of active allocations.
    pub paid_amount: Decimal,
    /// `max(0, total - paid)`.
    pub outstanding_amount: Decimal,
    /// Derived status.
    pub status: InvoiceStatus,
}

/// Recomputes an invoice's settlement figures from its full allocation
/// history. Never incremented ad hoc — always derived, to avoid drift.
#[must_use]
pub fn settle_invoice<'a, I>(total: Decimal, allocations: I) -> InvoiceSettlement
where
    I: IntoIterator<Item = &'a AllocationRecord>,
{
    let paid_amount: Decimal = allocations
        .into_iter()
        .filter(|a| a.state.is_active())
        .map(|a| a.amount)
        .sum();
    let outstanding_amount = (total - paid_amount).max(Decimal::ZERO);

    InvoiceSettlement {
        paid_amount,
        outstanding_amount,
        status: InvoiceStatus::derive(paid_amount, total),
    }
}

/// Sums a receipt's active allocations.
#[must_use]
pub fn receipt_allocated<'a, I>(allocations: I) -> Decimal
where
    I: IntoIterator<Item = &'a AllocationRecord>,
{
    allocations
        .into_iter()
        .filter(|a| a.state.is_active())
        .map(|a| a.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn active(amount: Decimal) -> AllocationRecord {
        AllocationRecord {
            id: AllocationId::new(),
            receipt_id: ReceiptId::new(),
            invoice_id: InvoiceId::new(),
            amount,
            state: AllocationState::Active,
        }
    }

    fn reversed(amount: Decimal) -> AllocationRecord {
        let mut record = active(amount);
        record.state = AllocationState::Reversed {
            reason: "test".to_string(),
            at: chrono::Utc::now().into(),
            by: UserId::new(),
        };
        record
    }

    #[test]
    fn test_status_unpaid() {
        assert_eq!(InvoiceStatus::derive(dec!(0), dec!(1000)), InvoiceStatus::Unpaid);
    }

    #[test]
    fn test_status_partially_paid() {
        assert_eq!(
            InvoiceStatus::derive(dec!(600), dec!(1000)),
            InvoiceStatus::PartiallyPaid
        );
    }

    #[test]
    fn test_status_paid_exact() {
        assert_eq!(InvoiceStatus::derive(dec!(1000), dec!(1000)), InvoiceStatus::Paid);
    }

    #[test]
    fn test_status_paid_within_tolerance() {
        assert_eq!(InvoiceStatus::derive(dec!(999.99), dec!(1000)), InvoiceStatus::Paid);
        assert_eq!(
            InvoiceStatus::derive(dec!(999.98), dec!(1000)),
            InvoiceStatus::PartiallyPaid
        );
    }

    #[test]
    fn test_settle_ignores_reversed() {
        let allocations = vec![active(dec!(600)), reversed(dec!(400))];
        let settlement = settle_invoice(dec!(1000), &allocations);
        assert_eq!(settlement.paid_amount, dec!(600));
        assert_eq!(settlement.outstanding_amount, dec!(400));
        assert_eq!(settlement.status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn test_settle_outstanding_never_negative() {
        // Overpayment clamps outstanding at zero.
        let allocations = vec![active(dec!(1200))];
        let settlement = settle_invoice(dec!(1000), &allocations);
        assert_eq!(settlement.outstanding_amount, dec!(0));
        assert_eq!(settlement.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_receipt_allocated_sums_active_only() {
        let allocations = vec![active(dec!(100)), active(dec!(50)), reversed(dec!(25))];
        assert_eq!(receipt_allocated(&allocations), dec!(150));
    }

    #[test]
    fn test_empty_history_is_unpaid() {
        let settlement = settle_invoice(dec!(500), &[]);
        assert_eq!(settlement.paid_amount, dec!(0));
        assert_eq!(settlement.outstanding_amount, dec!(500));
        assert_eq!(settlement.status, InvoiceStatus::Unpaid);
    }
}
