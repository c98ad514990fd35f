//! Accounting period state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PeriodError;

/// Lifecycle status of a monthly accounting period.
///
/// Transitions: open -> closed, closed -> open (reopen), closed ->
/// archived. Archived is terminal. Posting is only allowed while open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Accepting postings.
    Open,
    /// Locked against posting, may be reopened or archived.
    Closed,
    /// Permanently locked.
    Archived,
}

impl PeriodStatus {
    /// Returns true if the requested transition is allowed.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Open, Self::Closed) | (Self::Closed, Self::Open | Self::Archived)
        )
    }

    /// Returns true if journal entries may be posted into this period.
    #[must_use]
    pub const fn allows_posting(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Archived => "archived",
        };
        write!(f, "{name}")
    }
}

/// A calendar month with its posting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1 through 12.
    pub month: u32,
    /// Current status.
    pub status: PeriodStatus,
}

impl PeriodWindow {
    /// Returns true if `date` falls inside this period's month.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        month_bounds(self.year, self.month)
            .map(|(start, end)| date >= start && date <= end)
            .unwrap_or(false)
    }

    /// Validates a transition to `to`, returning the error on refusal.
    pub fn check_transition(&self, to: PeriodStatus) -> Result<(), PeriodError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(PeriodError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}

/// First and last day of a calendar month.
///
/// Fails on months outside 1..=12; leap years and December rollover are
/// handled by computing the first day of the following month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let start =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::InvalidMonth(month))?;
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(PeriodError::InvalidMonth(month))?;
    let end = next_month_start.pred_opt().ok_or(PeriodError::InvalidMonth(month))?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(PeriodStatus::Open, PeriodStatus::Closed, true)]
    #[case(PeriodStatus::Closed, PeriodStatus::Open, true)]
    #[case(PeriodStatus::Closed, PeriodStatus::Archived, true)]
    #[case(PeriodStatus::Open, PeriodStatus::Archived, false)]
    #[case(PeriodStatus::Archived, PeriodStatus::Open, false)]
    #[case(PeriodStatus::Archived, PeriodStatus::Closed, false)]
    #[case(PeriodStatus::Open, PeriodStatus::Open, false)]
    #[case(PeriodStatus::Closed, PeriodStatus::Closed, false)]
    fn test_transition_table(
        #[case] from: PeriodStatus,
        #[case] to: PeriodStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_only_open_allows_posting() {
        assert!(PeriodStatus::Open.allows_posting());
        assert!(!PeriodStatus::Closed.allows_posting());
        assert!(!PeriodStatus::Archived.allows_posting());
    }

    #[rstest]
    #[case(2026, 1, 31)]
    #[case(2026, 2, 28)]
    #[case(2028, 2, 29)]
    #[case(2026, 4, 30)]
    #[case(2026, 12, 31)]
    fn test_month_bounds(#[case] year: i32, #[case] month: u32, #[case] last_day: u32) {
        let (start, end) = month_bounds(year, month).unwrap();
        assert_eq!(start, ymd(year, month, 1));
        assert_eq!(end, ymd(year, month, last_day));
    }

    #[test]
    fn test_month_bounds_rejects_bad_month() {
        assert!(month_bounds(2026, 0).is_err());
        assert!(month_bounds(2026, 13).is_err());
    }

    #[test]
    fn test_contains_date() {
        let period = PeriodWindow {
            year: 2026,
            month: 2,
            status: PeriodStatus::Open,
        };
        assert!(period.contains_date(ymd(2026, 2, 1)));
        assert!(period.contains_date(ymd(2026, 2, 28)));
        assert!(!period.contains_date(ymd(2026, 3, 1)));
        assert!(!period.contains_date(ymd(2026, 1, 31)));
    }

    #[test]
    fn test_check_transition_reports_states() {
        let period = PeriodWindow {
            year: 2026,
            month: 1,
            status: PeriodStatus::Archived,
        };
        let err = period.check_transition(PeriodStatus::Open).unwrap_err();
        assert!(matches!(
            err,
            PeriodError::InvalidTransition {
                from: PeriodStatus::Archived,
                to: PeriodStatus::Open,
            }
        ));
    }
}
