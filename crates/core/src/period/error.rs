//! Accounting period error types.

use thiserror::Error;

use super::types::PeriodStatus;

/// Errors that can occur while managing accounting periods.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// Month must be 1 through 12.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// A period for this year and month already exists.
    #[error("Period {year}-{month:02} already exists")]
    PeriodExists {
        /// Calendar year.
        year: i32,
        /// Calendar month, 1 through 12.
        month: u32,
    },

    /// Period not found.
    #[error("Period not found")]
    PeriodNotFound,

    /// The requested status change is not allowed.
    #[error("Cannot transition period from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: PeriodStatus,
        /// Requested status.
        to: PeriodStatus,
    },
}

impl PeriodError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidMonth(_) => "INVALID_MONTH",
            Self::PeriodExists { .. } => "PERIOD_EXISTS",
            Self::PeriodNotFound => "PERIOD_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_PERIOD_TRANSITION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PeriodError::InvalidMonth(13).error_code(), "INVALID_MONTH");
        assert_eq!(
            PeriodError::InvalidTransition {
                from: PeriodStatus::Archived,
                to: PeriodStatus::Open,
            }
            .error_code(),
            "INVALID_PERIOD_TRANSITION"
        );
    }

    #[test]
    fn test_transition_display_names_both_states() {
        let err = PeriodError::InvalidTransition {
            from: PeriodStatus::Closed,
            to: PeriodStatus::Closed,
        };
        assert!(err.to_string().contains("closed"));
    }
}
