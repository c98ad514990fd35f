//! Integrity audit report types and comparison helpers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::{AccountId, InvoiceId};

use crate::allocation::InvoiceStatus;

/// A stored account balance that disagrees with the balance recomputed
/// from posting history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    /// The account.
    pub account_id: AccountId,
    /// The account code, for human-readable reports.
    pub code: String,
    /// Balance currently stored on the account row.
    pub stored: Decimal,
    /// Balance recomputed from the posting history.
    pub recomputed: Decimal,
    /// `stored - recomputed`.
    pub difference: Decimal,
}

/// A stored invoice snapshot that disagrees with its allocation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMismatch {
    /// The invoice.
    pub invoice_id: InvoiceId,
    /// Paid amount currently stored on the invoice row.
    pub stored_paid: Decimal,
    /// Paid amount recomputed from active allocations.
    pub recomputed_paid: Decimal,
    /// Status currently stored on the invoice row.
    pub stored_status: InvoiceStatus,
    /// Status derived from the recomputed figures.
    pub recomputed_status: InvoiceStatus,
}

/// Result of a full integrity sweep.
///
/// Mismatches are data, not errors. The sweep never mutates anything;
/// repair is a separate, explicit call that goes through the normal
/// posting and allocation paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    /// Number of accounts checked.
    pub accounts_checked: usize,
    /// Number of invoices checked.
    pub invoices_checked: usize,
    /// Accounts whose stored balance drifted from history.
    pub balance_mismatches: Vec<BalanceMismatch>,
    /// Invoices whose stored snapshot drifted from history.
    pub invoice_mismatches: Vec<InvoiceMismatch>,
}

impl AuditReport {
    /// Returns true if no drift was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.balance_mismatches.is_empty() && self.invoice_mismatches.is_empty()
    }
}

/// Compares a stored balance against its recomputed value.
///
/// Any difference counts as drift. The 0.01 posting tolerance does not
/// apply here: recomputation sums the same rows the stored balance was
/// built from, so the two must agree exactly.
#[must_use]
pub fn compare_balance(
    account_id: AccountId,
    code: &str,
    stored: Decimal,
    recomputed: Decimal,
) -> Option<BalanceMismatch> {
    if stored == recomputed {
        return None;
    }
    Some(BalanceMismatch {
        account_id,
        code: code.to_string(),
        stored,
        recomputed,
        difference: stored - recomputed,
    })
}

/// Compares a stored invoice snapshot against recomputed figures.
#[must_use]
pub fn compare_invoice(
    invoice_id: InvoiceId,
    stored_paid: Decimal,
    stored_status: InvoiceStatus,
    recomputed_paid: Decimal,
    recomputed_status: InvoiceStatus,
) -> Option<InvoiceMismatch> {
    if stored_paid == recomputed_paid && stored_status == recomputed_status {
        return None;
    }
    Some(InvoiceMismatch {
        invoice_id,
        stored_paid,
        recomputed_paid,
        stored_status,
        recomputed_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_matching_balance_is_clean() {
        assert!(compare_balance(AccountId::new(), "1000", dec!(500), dec!(500)).is_none());
    }

    #[test]
    fn test_drifted_balance_reports_difference() {
        let mismatch =
            compare_balance(AccountId::new(), "1000", dec!(500), dec!(450)).unwrap();
        assert_eq!(mismatch.difference, dec!(50));
        assert_eq!(mismatch.code, "1000");
    }

    #[test]
    fn test_small_drift_is_still_drift() {
        // No tolerance on recomputation.
        assert!(compare_balance(AccountId::new(), "1000", dec!(500.01), dec!(500)).is_some());
    }

    #[test]
    fn test_invoice_status_drift_detected() {
        let mismatch = compare_invoice(
            InvoiceId::new(),
            dec!(1000),
            InvoiceStatus::PartiallyPaid,
            dec!(1000),
            InvoiceStatus::Paid,
        )
        .unwrap();
        assert_eq!(mismatch.stored_status, InvoiceStatus::PartiallyPaid);
        assert_eq!(mismatch.recomputed_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_report_is_clean() {
        let mut report = AuditReport {
            accounts_checked: 10,
            invoices_checked: 5,
            ..AuditReport::default()
        };
        assert!(report.is_clean());

        report.balance_mismatches.push(BalanceMismatch {
            account_id: AccountId::new(),
            code: "1000".to_string(),
            stored: dec!(1),
            recomputed: dec!(2),
            difference: dec!(-1),
        });
        assert!(!report.is_clean());
    }
}
