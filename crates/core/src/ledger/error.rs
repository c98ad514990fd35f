//! Ledger error types for validation and state errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use keelbook_shared::types::{AccountId, JournalEntryId};

/// Errors that can occur during journal entry validation and posting.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// A journal entry must have at least 2 lines.
    #[error("Journal entry must have at least 2 lines")]
    InsufficientLines,

    /// Entry is not balanced (debits != credits beyond tolerance).
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// A line must carry an amount on exactly one side.
    #[error("Line {line_no} must have a positive amount on exactly one of debit or credit")]
    InvalidLineAmounts {
        /// 1-based position of the offending line.
        line_no: usize,
    },

    /// A line amount cannot be negative.
    #[error("Line {line_no} has a negative amount")]
    NegativeAmount {
        /// 1-based position of the offending line.
        line_no: usize,
    },

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Group accounts never receive postings directly.
    #[error("Account '{code}' is a group account and cannot receive postings")]
    AccountIsGroup {
        /// The offending account code.
        code: String,
    },

    /// Inactive accounts reject postings.
    #[error("Account '{code}' is inactive")]
    AccountInactive {
        /// The offending account code.
        code: String,
    },

    /// Frozen accounts reject postings.
    #[error("Account '{code}' is frozen")]
    AccountFrozen {
        /// The offending account code.
        code: String,
    },

    // ========== Period Errors ==========
    /// No accounting period covers the entry date.
    #[error("No accounting period found for date {0}")]
    NoPeriodForDate(NaiveDate),

    /// The accounting period for the entry date does not accept postings.
    #[error("Accounting period {year}-{month:02} is {status} and rejects postings")]
    PeriodNotOpen {
        /// Period year.
        year: i32,
        /// Period month (1-12).
        month: u32,
        /// Period status as text ("closed" or "archived").
        status: String,
    },

    // ========== Entry State Errors ==========
    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLines => "INSUFFICIENT_LINES",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::InvalidLineAmounts { .. } => "INVALID_LINE_AMOUNTS",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountIsGroup { .. } => "ACCOUNT_IS_GROUP",
            Self::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            Self::AccountFrozen { .. } => "ACCOUNT_FROZEN",
            Self::NoPeriodForDate(_) => "NO_PERIOD_FOR_DATE",
            Self::PeriodNotOpen { .. } => "PERIOD_NOT_OPEN",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::InsufficientLines.error_code(), "INSUFFICIENT_LINES");
        assert_eq!(
            LedgerError::UnbalancedEntry {
                debit: dec!(100),
                credit: dec!(50),
            }
            .error_code(),
            "UNBALANCED_ENTRY"
        );
        assert_eq!(
            LedgerError::AccountFrozen {
                code: "1101".to_string()
            }
            .error_code(),
            "ACCOUNT_FROZEN"
        );
    }

    #[test]
    fn test_error_display_names_account() {
        let err = LedgerError::AccountIsGroup {
            code: "1100".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Account '1100' is a group account and cannot receive postings"
        );
    }

    #[test]
    fn test_unbalanced_display_carries_amounts() {
        let err = LedgerError::UnbalancedEntry {
            debit: dec!(100.00),
            credit: dec!(50.00),
        };
        assert_eq!(
            err.to_string(),
            "Journal entry is not balanced. Debit: 100.00, Credit: 50.00"
        );
    }
}
