//! Journal entry domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::{AccountId, UserId};

/// Absolute tolerance for debit/credit equality: 0.01 currency unit.
///
/// A single tolerance is used everywhere an amount comparison is made
/// (entry balancing and paid-in-full detection).
#[must_use]
pub fn balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Journal entry status.
///
/// Posting is one-way: a posted entry is immutable and corrections are
/// made by separate reversing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry is being drafted and can be modified.
    Draft,
    /// Entry has been posted to the ledger (immutable).
    Posted,
}

/// Input for a single posting line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLineInput {
    /// The account to post to (must be a leaf, active, not frozen).
    pub account_id: AccountId,
    /// Debit amount (zero if this is a credit line).
    pub debit: Decimal,
    /// Credit amount (zero if this is a debit line).
    pub credit: Decimal,
    /// Optional memo for this line.
    pub memo: Option<String>,
}

/// Input for creating a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryInput {
    /// The date of the financial event.
    pub entry_date: NaiveDate,
    /// A description of the entry.
    pub description: String,
    /// Optional reference number (e.g., invoice number, voyage number).
    pub reference: Option<String>,
    /// The posting lines (must have at least 2).
    pub lines: Vec<JournalLineInput>,
    /// The user creating the entry.
    pub created_by: UserId,
}

/// Account facts the validator needs for one posting line.
///
/// The database layer resolves account IDs into this shape; validation
/// itself is pure.
#[derive(Debug, Clone)]
pub struct PostingAccount {
    /// The account ID.
    pub id: AccountId,
    /// The account code (used in error messages).
    pub code: String,
    /// Whether the account is a group (non-postable) node.
    pub is_group: bool,
    /// Whether the account is active.
    pub is_active: bool,
    /// Whether the account is frozen.
    pub is_frozen: bool,
    /// Which side increases this account's balance.
    pub nature: crate::account::AccountNature,
}

/// Entry totals computed during validation.
#[derive(Debug, Clone)]
pub struct EntryTotals {
    /// Total debit amount.
    pub debit: Decimal,
    /// Total credit amount.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Creates totals from debit and credit sums.
    #[must_use]
    pub const fn new(debit: Decimal, credit: Decimal) -> Self {
        Self { debit, credit }
    }

    /// Returns the signed difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true if debits equal credits within the 0.01 tolerance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.difference().abs() <= balance_tolerance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_totals_exactly_balanced() {
        let totals = EntryTotals::new(dec!(100.00), dec!(100.00));
        assert!(totals.is_balanced());
        assert_eq!(totals.difference(), Decimal::ZERO);
    }

    #[test]
    fn test_totals_within_tolerance() {
        let totals = EntryTotals::new(dec!(100.00), dec!(99.99));
        assert!(totals.is_balanced());
    }

    #[test]
    fn test_totals_beyond_tolerance() {
        let totals = EntryTotals::new(dec!(100.00), dec!(99.98));
        assert!(!totals.is_balanced());
        assert_eq!(totals.difference(), dec!(0.02));
    }

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(balance_tolerance(), dec!(0.01));
    }
}
