//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Journal entry domain types
//! - Balance and tolerance rules
//! - Entry validation against account facts
//! - Reversing-entry construction
//! - Error types for ledger operations

pub mod error;
pub mod reversal;
pub mod types;
pub mod validation;

pub use error::LedgerError;
pub use reversal::{reversal_description, reversing_lines, PostedLine};
pub use types::{
    balance_tolerance, EntryStatus, EntryTotals, JournalEntryInput, JournalLineInput,
    PostingAccount,
};
pub use validation::{validate_entry, ResolvedLine};
