//! Journal entry validation.
//!
//! Pure validation with no database dependencies: account facts are
//! supplied by a caller-provided lookup closure, mirroring how the
//! repositories resolve accounts inside their own unit of work.

use rust_decimal::Decimal;
use keelbook_shared::types::AccountId;

use super::error::LedgerError;
use super::types::{EntryTotals, JournalEntryInput, PostingAccount};

/// A validated posting line with its resolved account.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    /// The resolved account.
    pub account: PostingAccount,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Signed balance change for the account, per its nature.
    pub balance_change: Decimal,
    /// Optional memo.
    pub memo: Option<String>,
}

/// Validates a journal entry and resolves its lines.
///
/// Steps:
/// 1. At least 2 lines.
/// 2. Each line carries a positive amount on exactly one side.
/// 3. Each account exists, is a leaf, active, and not frozen — failures
///    name the offending account.
/// 4. Total debits equal total credits within the 0.01 tolerance.
///
/// # Errors
///
/// Returns `LedgerError` naming the first violated rule; nothing is
/// applied on failure.
pub fn validate_entry<A>(
    input: &JournalEntryInput,
    account_lookup: A,
) -> Result<(Vec<ResolvedLine>, EntryTotals), LedgerError>
where
    A: Fn(AccountId) -> Result<PostingAccount, LedgerError>,
{
    if input.lines.len() < 2 {
        return Err(LedgerError::InsufficientLines);
    }

    let mut resolved = Vec::with_capacity(input.lines.len());

    for (idx, line) in input.lines.iter().enumerate() {
        let line_no = idx + 1;

        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount { line_no });
        }

        let debit_set = line.debit > Decimal::ZERO;
        let credit_set = line.credit > Decimal::ZERO;
        if debit_set == credit_set {
            // Both sides set, or neither.
            return Err(LedgerError::InvalidLineAmounts { line_no });
        }

        let account = account_lookup(line.account_id)?;
        if account.is_group {
            return Err(LedgerError::AccountIsGroup {
                code: account.code,
            });
        }
        if !account.is_active {
            return Err(LedgerError::AccountInactive {
                code: account.code,
            });
        }
        if account.is_frozen {
            return Err(LedgerError::AccountFrozen {
                code: account.code,
            });
        }

        let balance_change = account.nature.balance_change(line.debit, line.credit);
        resolved.push(ResolvedLine {
            account,
            debit: line.debit,
            credit: line.credit,
            balance_change,
            memo: line.memo.clone(),
        });
    }

    let totals = EntryTotals::new(
        resolved.iter().map(|l| l.debit).sum(),
        resolved.iter().map(|l| l.credit).sum(),
    );

    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    Ok((resolved, totals))
}
