//! Reversing-entry construction.
//!
//! Posted entries are immutable; a correction is a new entry with debits
//! and credits swapped. This module builds that mirror image.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::{AccountId, JournalEntryId};

use super::types::JournalLineInput;

/// A posted line to be reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedLine {
    /// The account the original line hit.
    pub account_id: AccountId,
    /// Original debit amount.
    pub debit: Decimal,
    /// Original credit amount.
    pub credit: Decimal,
    /// Original memo.
    pub memo: Option<String>,
}

/// Builds mirrored lines for a reversing entry: every debit becomes a
/// credit and vice versa. Memos are prefixed so ledgers read naturally.
#[must_use]
pub fn reversing_lines(original: &[PostedLine]) -> Vec<JournalLineInput> {
    original
        .iter()
        .map(|line| JournalLineInput {
            account_id: line.account_id,
            debit: line.credit,
            credit: line.debit,
            memo: Some(format!(
                "Reversal: {}",
                line.memo.clone().unwrap_or_default()
            )),
        })
        .collect()
}

/// Builds the description for a reversing entry.
#[must_use]
pub fn reversal_description(original_id: JournalEntryId, reason: &str) -> String {
    format!("Reversal of entry {original_id}. Reason: {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lines() -> Vec<PostedLine> {
        vec![
            PostedLine {
                account_id: AccountId::new(),
                debit: dec!(250.00),
                credit: Decimal::ZERO,
                memo: Some("Port fees".to_string()),
            },
            PostedLine {
                account_id: AccountId::new(),
                debit: Decimal::ZERO,
                credit: dec!(250.00),
                memo: None,
            },
        ]
    }

    #[test]
    fn test_sides_are_swapped() {
        let reversed = reversing_lines(&lines());
        assert_eq!(reversed[0].debit, Decimal::ZERO);
        assert_eq!(reversed[0].credit, dec!(250.00));
        assert_eq!(reversed[1].debit, dec!(250.00));
        assert_eq!(reversed[1].credit, Decimal::ZERO);
    }

    #[test]
    fn test_reversal_stays_balanced() {
        let reversed = reversing_lines(&lines());
        let debit: Decimal = reversed.iter().map(|l| l.debit).sum();
        let credit: Decimal = reversed.iter().map(|l| l.credit).sum();
        assert_eq!(debit, credit);
    }

    #[test]
    fn test_memo_prefixed() {
        let reversed = reversing_lines(&lines());
        assert_eq!(reversed[0].memo.as_deref(), Some("Reversal: Port fees"));
        assert_eq!(reversed[1].memo.as_deref(), Some("Reversal: "));
    }

    #[test]
    fn test_description_names_original() {
        let id = JournalEntryId::new();
        let desc = reversal_description(id, "duplicate posting");
        assert!(desc.contains(&id.to_string()));
        assert!(desc.contains("duplicate posting"));
    }
}
