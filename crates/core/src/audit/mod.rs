//! Integrity auditing over stored snapshots.

pub mod types;

pub use types::{compare_balance, compare_invoice, AuditReport, BalanceMismatch, InvoiceMismatch};
