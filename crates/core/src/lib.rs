//! Core business logic for Keelbook.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `account` - Chart of accounts rules and hierarchy building
//! - `ledger` - Double-entry journal validation and balance math
//! - `allocation` - Payment-to-invoice allocation, ordering, and aging
//! - `period` - Accounting period state machine
//! - `audit` - Integrity recomputation and mismatch reporting

pub mod account;
pub mod allocation;
pub mod audit;
pub mod ledger;
pub mod period;
