//! Monthly accounting period lifecycle.

pub mod error;
pub mod types;

pub use error::PeriodError;
pub use types::{month_bounds, PeriodStatus, PeriodWindow};
