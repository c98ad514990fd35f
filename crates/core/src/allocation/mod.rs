//! Payment-to-invoice allocation logic.
//!
//! This module implements the allocation engine's pure rules:
//! - Settlement derivation (paid/outstanding/status from history)
//! - Single and cumulative batch cap validation
//! - Auto-settlement planning with explicit ordering policies
//! - Aging classification for receivables reporting

pub mod engine;
pub mod error;
pub mod ordering;
pub mod types;

pub use engine::{
    plan_auto_allocation, validate_allocation, validate_batch, AllocationRequest,
    PlannedAllocation,
};
pub use error::AllocationError;
pub use ordering::{days_overdue, sort_invoices, AgingBucket, OutstandingInvoice, SettlementOrder};
pub use types::{
    receipt_allocated, settle_invoice, AllocationRecord, AllocationState, InvoiceSettlement,
    InvoiceStatus,
};
