//! Chart of accounts rules.
//!
//! This module implements the account-side business rules:
//! - Account type and nature classification
//! - Balance change direction per account nature
//! - Hierarchy (forest) construction from a flat account list
//! - Deletion and posting eligibility checks

pub mod hierarchy;
pub mod types;

pub use hierarchy::{build_hierarchy, AccountNode};
pub use types::{is_valid_code, AccountNature, AccountSummary, AccountType, MAX_CODE_LEN};
