//! `SeaORM` entity definitions.

pub mod accounting_periods;
pub mod accounts;
pub mod allocations;
pub mod invoices;
pub mod journal_entries;
pub mod journal_lines;
pub mod receipts;
pub mod sea_orm_active_enums;
