//! `SeaORM` active enums mapped to Postgres enum types.
//!
//! Each enum converts to and from its pure-logic counterpart so that
//! repositories can hand core code plain domain values.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account type classification.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[sea_orm(string_value = "asset")]
    Asset,
    #[sea_orm(string_value = "liability")]
    Liability,
    #[sea_orm(string_value = "equity")]
    Equity,
    #[sea_orm(string_value = "revenue")]
    Revenue,
    #[sea_orm(string_value = "expense")]
    Expense,
}

/// Account nature: which side increases the balance.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_nature")]
#[serde(rename_all = "lowercase")]
pub enum AccountNature {
    #[sea_orm(string_value = "debit")]
    Debit,
    #[sea_orm(string_value = "credit")]
    Credit,
}

/// Journal entry status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_status")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "posted")]
    Posted,
}

/// Invoice settlement status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "invoice_status")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "partially_paid")]
    PartiallyPaid,
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Accounting period status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_status")]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl From<AccountType> for keelbook_core::account::AccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Revenue => Self::Revenue,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<keelbook_core::account::AccountType> for AccountType {
    fn from(value: keelbook_core::account::AccountType) -> Self {
        match value {
            keelbook_core::account::AccountType::Asset => Self::Asset,
            keelbook_core::account::AccountType::Liability => Self::Liability,
            keelbook_core::account::AccountType::Equity => Self::Equity,
            keelbook_core::account::AccountType::Revenue => Self::Revenue,
            keelbook_core::account::AccountType::Expense => Self::Expense,
        }
    }
}

impl From<AccountNature> for keelbook_core::account::AccountNature {
    fn from(value: AccountNature) -> Self {
        match value {
            AccountNature::Debit => Self::Debit,
            AccountNature::Credit => Self::Credit,
        }
    }
}

impl From<keelbook_core::account::AccountNature> for AccountNature {
    fn from(value: keelbook_core::account::AccountNature) -> Self {
        match value {
            keelbook_core::account::AccountNature::Debit => Self::Debit,
            keelbook_core::account::AccountNature::Credit => Self::Credit,
        }
    }
}

impl From<EntryStatus> for keelbook_core::ledger::EntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Draft => Self::Draft,
            EntryStatus::Posted => Self::Posted,
        }
    }
}

impl From<keelbook_core::ledger::EntryStatus> for EntryStatus {
    fn from(value: keelbook_core::ledger::EntryStatus) -> Self {
        match value {
            keelbook_core::ledger::EntryStatus::Draft => Self::Draft,
            keelbook_core::ledger::EntryStatus::Posted => Self::Posted,
        }
    }
}

impl From<InvoiceStatus> for keelbook_core::allocation::InvoiceStatus {
    fn from(value: InvoiceStatus) -> Self {
        match value {
            InvoiceStatus::Unpaid => Self::Unpaid,
            InvoiceStatus::PartiallyPaid => Self::PartiallyPaid,
            InvoiceStatus::Paid => Self::Paid,
        }
    }
}

impl From<keelbook_core::allocation::InvoiceStatus> for InvoiceStatus {
    fn from(value: keelbook_core::allocation::InvoiceStatus) -> Self {
        match value {
            keelbook_core::allocation::InvoiceStatus::Unpaid => Self::Unpaid,
            keelbook_core::allocation::InvoiceStatus::PartiallyPaid => Self::PartiallyPaid,
            keelbook_core::allocation::InvoiceStatus::Paid => Self::Paid,
        }
    }
}

impl From<PeriodStatus> for keelbook_core::period::PeriodStatus {
    fn from(value: PeriodStatus) -> Self {
        match value {
            PeriodStatus::Open => Self::Open,
            PeriodStatus::Closed => Self::Closed,
            PeriodStatus::Archived => Self::Archived,
        }
    }
}

impl From<keelbook_core::period::PeriodStatus> for PeriodStatus {
    fn from(value: keelbook_core::period::PeriodStatus) -> Self {
        match value {
            keelbook_core::period::PeriodStatus::Open => Self::Open,
            keelbook_core::period::PeriodStatus::Closed => Self::Closed,
            keelbook_core::period::PeriodStatus::Archived => Self::Archived,
        }
    }
}
