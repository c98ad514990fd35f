//! Settlement ordering and aging classification.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use keelbook_shared::types::InvoiceId;

/// Policy for choosing which outstanding invoices to settle first.
///
/// `Fifo` is the default for automatic application; the others are
/// explicit caller choices and are never applied implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOrder {
    /// Oldest invoice date first, ties broken by insertion order.
    #[default]
    Fifo,
    /// Smallest outstanding amount first.
    AmountAsc,
    /// Largest outstanding amount first.
    AmountDesc,
    /// Most days overdue first.
    MostOverdue,
}

/// An outstanding invoice as seen by the settlement planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingInvoice {
    /// The invoice ID.
    pub id: InvoiceId,
    /// The invoice date (drives FIFO ordering).
    pub invoice_date: NaiveDate,
    /// The due date (drives overdue classification).
    pub due_date: NaiveDate,
    /// Outstanding amount still to be settled.
    pub outstanding: Decimal,
    /// Insertion sequence, used as the FIFO tie-breaker.
    pub seq: i64,
}

/// Sorts outstanding invoices according to the settlement order.
///
/// All orderings fall back to `(invoice_date, seq)` for equal keys, so
/// results are deterministic.
pub fn sort_invoices(invoices: &mut [OutstandingInvoice], order: SettlementOrder, as_of: NaiveDate) {
    match order {
        SettlementOrder::Fifo => {
            invoices.sort_by(|a, b| (a.invoice_date, a.seq).cmp(&(b.invoice_date, b.seq)));
        }
        SettlementOrder::AmountAsc => {
            invoices.sort_by(|a, b| {
                (a.outstanding, a.invoice_date, a.seq).cmp(&(b.outstanding, b.invoice_date, b.seq))
            });
        }
        SettlementOrder::AmountDesc => {
            invoices.sort_by(|a, b| {
                (b.outstanding, a.invoice_date, a.seq).cmp(&(a.outstanding, b.invoice_date, b.seq))
            });
        }
        SettlementOrder::MostOverdue => {
            invoices.sort_by(|a, b| {
                (days_overdue(as_of, b.due_date), a.invoice_date, a.seq).cmp(&(
                    days_overdue(as_of, a.due_date),
                    b.invoice_date,
                    b.seq,
                ))
            });
        }
    }
}

/// Days an invoice is overdue: `max(0, as_of - due_date)` in whole days.
///
/// Classification only — never used to mutate invoice state.
#[must_use]
pub fn days_overdue(as_of: NaiveDate, due_date: NaiveDate) -> i64 {
    (as_of - due_date).num_days().max(0)
}

/// Aging bucket for receivables reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    /// Not yet overdue.
    Current,
    /// 1-30 days overdue.
    Days1To30,
    /// 31-60 days overdue.
    Days31To60,
    /// 61-90 days overdue.
    Days61To90,
    /// More than 90 days overdue.
    Over90,
}

impl AgingBucket {
    /// Classifies a days-overdue count into a bucket.
    #[must_use]
    pub const fn for_days(days: i64) -> Self {
        match days {
            i64::MIN..=0 => Self::Current,
            1..=30 => Self::Days1To30,
            31..=60 => Self::Days31To60,
            61..=90 => Self::Days61To90,
            _ => Self::Over90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(date: NaiveDate, due: NaiveDate, outstanding: Decimal, seq: i64) -> OutstandingInvoice {
        OutstandingInvoice {
            id: InvoiceId::new(),
            invoice_date: date,
            due_date: due,
            outstanding,
            seq,
        }
    }

    #[test]
    fn test_fifo_orders_by_date_then_seq() {
        let mut invoices = vec![
            invoice(ymd(2026, 2, 1), ymd(2026, 3, 1), dec!(100), 3),
            invoice(ymd(2026, 1, 1), ymd(2026, 2, 1), dec!(100), 2),
            invoice(ymd(2026, 1, 1), ymd(2026, 2, 1), dec!(100), 1),
        ];
        sort_invoices(&mut invoices, SettlementOrder::Fifo, ymd(2026, 6, 1));
        let seqs: Vec<i64> = invoices.iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_amount_orderings() {
        let mut invoices = vec![
            invoice(ymd(2026, 1, 1), ymd(2026, 2, 1), dec!(300), 1),
            invoice(ymd(2026, 1, 2), ymd(2026, 2, 2), dec!(100), 2),
            invoice(ymd(2026, 1, 3), ymd(2026, 2, 3), dec!(200), 3),
        ];

        sort_invoices(&mut invoices, SettlementOrder::AmountAsc, ymd(2026, 6, 1));
        let asc: Vec<Decimal> = invoices.iter().map(|i| i.outstanding).collect();
        assert_eq!(asc, vec![dec!(100), dec!(200), dec!(300)]);

        sort_invoices(&mut invoices, SettlementOrder::AmountDesc, ymd(2026, 6, 1));
        let desc: Vec<Decimal> = invoices.iter().map(|i| i.outstanding).collect();
        assert_eq!(desc, vec![dec!(300), dec!(200), dec!(100)]);
    }

    #[test]
    fn test_most_overdue_first() {
        let mut invoices = vec![
            invoice(ymd(2026, 3, 1), ymd(2026, 5, 1), dec!(100), 1),
            invoice(ymd(2026, 1, 1), ymd(2026, 2, 1), dec!(100), 2),
        ];
        sort_invoices(&mut invoices, SettlementOrder::MostOverdue, ymd(2026, 6, 1));
        assert_eq!(invoices[0].seq, 2);
    }

    #[rstest]
    #[case(0, AgingBucket::Current)]
    #[case(1, AgingBucket::Days1To30)]
    #[case(30, AgingBucket::Days1To30)]
    #[case(31, AgingBucket::Days31To60)]
    #[case(60, AgingBucket::Days31To60)]
    #[case(61, AgingBucket::Days61To90)]
    #[case(90, AgingBucket::Days61To90)]
    #[case(91, AgingBucket::Over90)]
    #[case(365, AgingBucket::Over90)]
    fn test_aging_bucket_boundaries(#[case] days: i64, #[case] expected: AgingBucket) {
        assert_eq!(AgingBucket::for_days(days), expected);
    }

    #[test]
    fn test_days_overdue_clamps_at_zero() {
        assert_eq!(days_overdue(ymd(2026, 1, 1), ymd(2026, 2, 1)), 0);
        assert_eq!(days_overdue(ymd(2026, 2, 1), ymd(2026, 2, 1)), 0);
        assert_eq!(days_overdue(ymd(2026, 2, 11), ymd(2026, 2, 1)), 10);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Sorting preserves the multiset of invoices for every order.
        #[test]
        fn prop_sort_preserves_invoices(
            seqs in prop::collection::vec(0i64..1000, 1..20),
            order_pick in 0usize..4,
        ) {
            let order = [
                SettlementOrder::Fifo,
                SettlementOrder::AmountAsc,
                SettlementOrder::AmountDesc,
                SettlementOrder::MostOverdue,
            ][order_pick];

            let mut invoices: Vec<OutstandingInvoice> = seqs
                .iter()
                .map(|&seq| {
                    invoice(
                        ymd(2026, 1, 1) + chrono::Days::new((seq % 28) as u64),
                        ymd(2026, 2, 1) + chrono::Days::new((seq % 28) as u64),
                        Decimal::new(seq + 1, 0),
                        seq,
                    )
                })
                .collect();

            let mut before: Vec<i64> = invoices.iter().map(|i| i.seq).collect();
            before.sort_unstable();

            sort_invoices(&mut invoices, order, ymd(2026, 6, 1));

            let mut after: Vec<i64> = invoices.iter().map(|i| i.seq).collect();
            after.sort_unstable();
            prop_assert_eq!(before, after);
        }

        /// FIFO output is non-decreasing by (invoice_date, seq).
        #[test]
        fn prop_fifo_is_monotone(seqs in prop::collection::vec(0i64..1000, 1..20)) {
            let mut invoices: Vec<OutstandingInvoice> = seqs
                .iter()
                .map(|&seq| {
                    invoice(
                        ymd(2026, 1, 1) + chrono::Days::new((seq % 200) as u64),
                        ymd(2026, 3, 1),
                        dec!(100),
                        seq,
                    )
                })
                .collect();

            sort_invoices(&mut invoices, SettlementOrder::Fifo, ymd(2026, 6, 1));

            for pair in invoices.windows(2) {
                prop_assert!(
                    (pair[0].invoice_date, pair[0].seq) <= (pair[1].invoice_date, pair[1].seq)
                );
            }
        }

        /// Buckets partition the whole days axis with no gaps.
        #[test]
        fn prop_every_day_count_has_a_bucket(days in -1000i64..10_000) {
            // for_days is total; just ensure consistency at boundaries.
            let bucket = AgingBucket::for_days(days);
            if days <= 0 {
                prop_assert_eq!(bucket, AgingBucket::Current);
            } else if days <= 30 {
                prop_assert_eq!(bucket, AgingBucket::Days1To30);
            } else if days <= 60 {
                prop_assert_eq!(bucket, AgingBucket::Days31To60);
            } else if days <= 90 {
                prop_assert_eq!(bucket, AgingBucket::Days61To90);
            } else {
                prop_assert_eq!(bucket, AgingBucket::Over90);
            }
        }
    }
}
