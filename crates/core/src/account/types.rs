//! Account classification types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::AccountId;

/// Maximum length of an account code.
pub const MAX_CODE_LEN: usize = 32;

/// Account type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account.
    Asset,
    /// Liability account.
    Liability,
    /// Equity account.
    Equity,
    /// Revenue account.
    Revenue,
    /// Expense account.
    Expense,
}

impl AccountType {
    /// Returns the conventional nature for this account type.
    ///
    /// Assets and expenses are debit-normal; liabilities, equity, and
    /// revenue are credit-normal. Individual accounts may override this
    /// (e.g., contra accounts), which is why nature is stored per account.
    #[must_use]
    pub const fn default_nature(self) -> AccountNature {
        match self {
            Self::Asset | Self::Expense => AccountNature::Debit,
            Self::Liability | Self::Equity | Self::Revenue => AccountNature::Credit,
        }
    }
}

/// Account nature: which side increases the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountNature {
    /// Debits increase the balance.
    Debit,
    /// Credits increase the balance.
    Credit,
}

impl AccountNature {
    /// Calculates the signed balance change for a posting line.
    ///
    /// Debit-nature: `balance += debit - credit`.
    /// Credit-nature: `balance += credit - debit`.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// Flat account record used for hierarchy building and posting checks.
///
/// The database layer maps its account model into this shape; core logic
/// never sees ORM types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    /// The account ID.
    pub id: AccountId,
    /// Unique account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Parent account, if any.
    pub parent_id: Option<AccountId>,
    /// Depth in the hierarchy (root = 1).
    pub level: i32,
    /// Group accounts organize children and never receive postings.
    pub is_group: bool,
    /// Inactive accounts reject postings.
    pub is_active: bool,
    /// Frozen accounts reject postings.
    pub is_frozen: bool,
    /// Authoritative running balance.
    pub balance: Decimal,
}

impl AccountSummary {
    /// Returns true if the account may be the target of a posting line.
    #[must_use]
    pub fn is_postable(&self) -> bool {
        !self.is_group && self.is_active && !self.is_frozen
    }
}

/// Validates an account code: non-empty, bounded length, no whitespace.
#[must_use]
pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= MAX_CODE_LEN && !code.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_nature() {
        assert_eq!(AccountType::Asset.default_nature(), AccountNature::Debit);
        assert_eq!(AccountType::Expense.default_nature(), AccountNature::Debit);
        assert_eq!(AccountType::Liability.default_nature(), AccountNature::Credit);
        assert_eq!(AccountType::Equity.default_nature(), AccountNature::Credit);
        assert_eq!(AccountType::Revenue.default_nature(), AccountNature::Credit);
    }

    #[test]
    fn test_debit_nature_balance_change() {
        let nature = AccountNature::Debit;
        assert_eq!(nature.balance_change(dec!(100), dec!(0)), dec!(100));
        assert_eq!(nature.balance_change(dec!(0), dec!(50)), dec!(-50));
        assert_eq!(nature.balance_change(dec!(100), dec!(30)), dec!(70));
    }

    #[test]
    fn test_credit_nature_balance_change() {
        let nature = AccountNature::Credit;
        assert_eq!(nature.balance_change(dec!(0), dec!(100)), dec!(100));
        assert_eq!(nature.balance_change(dec!(50), dec!(0)), dec!(-50));
        assert_eq!(nature.balance_change(dec!(30), dec!(100)), dec!(70));
    }

    #[test]
    fn test_is_postable() {
        let mut account = AccountSummary {
            id: AccountId::new(),
            code: "1101".to_string(),
            name: "Cash".to_string(),
            parent_id: None,
            level: 1,
            is_group: false,
            is_active: true,
            is_frozen: false,
            balance: Decimal::ZERO,
        };
        assert!(account.is_postable());

        account.is_group = true;
        assert!(!account.is_postable());
        account.is_group = false;

        account.is_active = false;
        assert!(!account.is_postable());
        account.is_active = true;

        account.is_frozen = true;
        assert!(!account.is_postable());
    }

    #[test]
    fn test_code_validation() {
        assert!(is_valid_code("1101"));
        assert!(is_valid_code("1.1.01"));
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("11 01"));
        assert!(!is_valid_code(&"9".repeat(MAX_CODE_LEN + 1)));
    }
}
