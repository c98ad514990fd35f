//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the
//! application. Every mutating path on shared financial fields lives
//! here; callers cannot bypass locking or recomputation.

pub mod account;
pub mod allocation;
pub mod audit;
pub mod coordinator;
pub mod period;
pub mod posting;

pub use account::{
    AccountError, AccountFilter, AccountRepository, CreateAccountInput, UpdateAccountInput,
};
pub use allocation::{AgingLine, AgingReport, AllocationRepository, InvoiceFilter, SettlementError};
pub use audit::{AuditError, AuditRepository};
pub use coordinator::{CoordinatorError, LedgerCoordinator};
pub use period::{PeriodRepoError, PeriodRepository};
pub use posting::{PostedEntry, PostingError, PostingRepository};
