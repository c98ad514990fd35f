//! Allocation cap validation and auto-allocation planning.
//!
//! These are the pure rules the allocation repository enforces inside its
//! unit of work: single-allocation caps, cumulative batch caps, and the
//! FIFO application plan for auto-settlement.

use std::collections::HashMap;

use rust_decimal::Decimal;
use keelbook_shared::types::{InvoiceId, ReceiptId};

use super::error::AllocationError;
use super::ordering::OutstandingInvoice;

/// One requested allocation inside a batch.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    /// The invoice to settle.
    pub invoice_id: InvoiceId,
    /// The receipt the money comes from.
    pub receipt_id: ReceiptId,
    /// The amount to allocate.
    pub amount: Decimal,
    /// Optional notes stored on the allocation row.
    pub notes: Option<String>,
}

/// Validates a single allocation against the invoice and receipt caps.
///
/// # Errors
///
/// - `NonPositiveAmount` if `amount <= 0`
/// - `ExceedsOutstanding` if `amount > outstanding`
/// - `ExceedsRemaining` if `amount > remaining`
pub fn validate_allocation(
    invoice_id: InvoiceId,
    receipt_id: ReceiptId,
    amount: Decimal,
    invoice_outstanding: Decimal,
    receipt_remaining: Decimal,
) -> Result<(), AllocationError> {
    if amount <= Decimal::ZERO {
        return Err(AllocationError::NonPositiveAmount(amount));
    }
    if amount > invoice_outstanding {
        return Err(AllocationError::ExceedsOutstanding {
            invoice_id,
            requested: amount,
            outstanding: invoice_outstanding,
        });
    }
    if amount > receipt_remaining {
        return Err(AllocationError::ExceedsRemaining {
            receipt_id,
            requested: amount,
            remaining: receipt_remaining,
        });
    }
    Ok(())
}

/// Validates a batch of allocations against cumulative caps.
///
/// The caps are checked against the combined effect of the whole batch:
/// two requests drawing on the same receipt must fit its remaining amount
/// together, and two requests settling the same invoice must fit its
/// outstanding amount together. Any violation rejects the entire batch.
///
/// # Errors
///
/// Returns the first cap violation found; the caller must not apply any
/// part of the batch on error.
pub fn validate_batch(
    requests: &[AllocationRequest],
    invoice_outstanding: &HashMap<InvoiceId, Decimal>,
    receipt_remaining: &HashMap<ReceiptId, Decimal>,
) -> Result<(), AllocationError> {
    if requests.is_empty() {
        return Err(AllocationError::EmptyBatch);
    }

    let mut per_invoice: HashMap<InvoiceId, Decimal> = HashMap::new();
    let mut per_receipt: HashMap<ReceiptId, Decimal> = HashMap::new();

    for request in requests {
        if request.amount <= Decimal::ZERO {
            return Err(AllocationError::NonPositiveAmount(request.amount));
        }

        let outstanding = invoice_outstanding
            .get(&request.invoice_id)
            .copied()
            .ok_or(AllocationError::InvoiceNotFound(request.invoice_id))?;
        let remaining = receipt_remaining
            .get(&request.receipt_id)
            .copied()
            .ok_or(AllocationError::ReceiptNotFound(request.receipt_id))?;

        let invoice_total = per_invoice.entry(request.invoice_id).or_default();
        *invoice_total += request.amount;
        if *invoice_total > outstanding {
            return Err(AllocationError::ExceedsOutstanding {
                invoice_id: request.invoice_id,
                requested: *invoice_total,
                outstanding,
            });
        }

        let receipt_total = per_receipt.entry(request.receipt_id).or_default();
        *receipt_total += request.amount;
        if *receipt_total > remaining {
            return Err(AllocationError::ExceedsRemaining {
                receipt_id: request.receipt_id,
                requested: *receipt_total,
                remaining,
            });
        }
    }

    Ok(())
}

/// A planned allocation produced by auto-settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAllocation {
    /// The invoice to settle.
    pub invoice_id: InvoiceId,
    /// The amount to apply.
    pub amount: Decimal,
}

/// Plans how a receipt's remaining amount settles a list of outstanding
/// invoices, in the order given.
///
/// Each invoice absorbs up to its outstanding amount; the walk stops once
/// the funds run out. The caller chooses the ordering (FIFO by default)
/// before calling.
#[must_use]
pub fn plan_auto_allocation(
    mut remaining: Decimal,
    invoices: &[OutstandingInvoice],
) -> Vec<PlannedAllocation> {
    let mut plan = Vec::new();

    for invoice in invoices {
        if remaining <= Decimal::ZERO {
            break;
        }
        if invoice.outstanding <= Decimal::ZERO {
            continue;
        }
        let amount = invoice.outstanding.min(remaining);
        remaining -= amount;
        plan.push(PlannedAllocation {
            invoice_id: invoice.id,
            amount,
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn request(invoice_id: InvoiceId, receipt_id: ReceiptId, amount: Decimal) -> AllocationRequest {
        AllocationRequest {
            invoice_id,
            receipt_id,
            amount,
            notes: None,
        }
    }

    fn outstanding(id: InvoiceId, amount: Decimal, seq: i64) -> OutstandingInvoice {
        OutstandingInvoice {
            id,
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            outstanding: amount,
            seq,
        }
    }

    #[test]
    fn test_validate_allocation_happy_path() {
        assert!(validate_allocation(
            InvoiceId::new(),
            ReceiptId::new(),
            dec!(100),
            dec!(400),
            dec!(600),
        )
        .is_ok());
    }

    #[test]
    fn test_validate_allocation_zero_rejected() {
        assert!(matches!(
            validate_allocation(InvoiceId::new(), ReceiptId::new(), dec!(0), dec!(400), dec!(600)),
            Err(AllocationError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn test_validate_allocation_exceeds_outstanding() {
        assert!(matches!(
            validate_allocation(
                InvoiceId::new(),
                ReceiptId::new(),
                dec!(500),
                dec!(400),
                dec!(600)
            ),
            Err(AllocationError::ExceedsOutstanding { .. })
        ));
    }

    #[test]
    fn test_validate_allocation_exceeds_remaining() {
        assert!(matches!(
            validate_allocation(
                InvoiceId::new(),
                ReceiptId::new(),
                dec!(500),
                dec!(800),
                dec!(400)
            ),
            Err(AllocationError::ExceedsRemaining { .. })
        ));
    }

    #[test]
    fn test_batch_cumulative_receipt_cap() {
        // Two entries against the same receipt whose combined amount
        // exceeds its remaining must reject the entire batch.
        let invoice_a = InvoiceId::new();
        let invoice_b = InvoiceId::new();
        let receipt = ReceiptId::new();

        let requests = vec![
            request(invoice_a, receipt, dec!(300)),
            request(invoice_b, receipt, dec!(300)),
        ];
        let invoice_caps =
            HashMap::from([(invoice_a, dec!(1000)), (invoice_b, dec!(1000))]);
        let receipt_caps = HashMap::from([(receipt, dec!(500))]);

        match validate_batch(&requests, &invoice_caps, &receipt_caps) {
            Err(AllocationError::ExceedsRemaining {
                requested,
                remaining,
                ..
            }) => {
                assert_eq!(requested, dec!(600));
                assert_eq!(remaining, dec!(500));
            }
            other => panic!("expected ExceedsRemaining, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_cumulative_invoice_cap() {
        let invoice = InvoiceId::new();
        let receipt_a = ReceiptId::new();
        let receipt_b = ReceiptId::new();

        let requests = vec![
            request(invoice, receipt_a, dec!(300)),
            request(invoice, receipt_b, dec!(300)),
        ];
        let invoice_caps = HashMap::from([(invoice, dec!(400))]);
        let receipt_caps =
            HashMap::from([(receipt_a, dec!(1000)), (receipt_b, dec!(1000))]);

        assert!(matches!(
            validate_batch(&requests, &invoice_caps, &receipt_caps),
            Err(AllocationError::ExceedsOutstanding { .. })
        ));
    }

    #[test]
    fn test_batch_within_caps_accepted() {
        let invoice = InvoiceId::new();
        let receipt = ReceiptId::new();
        let requests = vec![
            request(invoice, receipt, dec!(200)),
            request(invoice, receipt, dec!(200)),
        ];
        let invoice_caps = HashMap::from([(invoice, dec!(400))]);
        let receipt_caps = HashMap::from([(receipt, dec!(400))]);

        assert!(validate_batch(&requests, &invoice_caps, &receipt_caps).is_ok());
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            validate_batch(&[], &HashMap::new(), &HashMap::new()),
            Err(AllocationError::EmptyBatch)
        ));
    }

    #[test]
    fn test_batch_unknown_invoice_rejected() {
        let requests = vec![request(InvoiceId::new(), ReceiptId::new(), dec!(100))];
        assert!(matches!(
            validate_batch(&requests, &HashMap::new(), &HashMap::new()),
            Err(AllocationError::InvoiceNotFound(_))
        ));
    }

    #[test]
    fn test_plan_exhausts_funds_in_order() {
        let first = InvoiceId::new();
        let second = InvoiceId::new();
        let third = InvoiceId::new();
        let invoices = vec![
            outstanding(first, dec!(400), 1),
            outstanding(second, dec!(300), 2),
            outstanding(third, dec!(500), 3),
        ];

        let plan = plan_auto_allocation(dec!(600), &invoices);
        assert_eq!(
            plan,
            vec![
                PlannedAllocation { invoice_id: first, amount: dec!(400) },
                PlannedAllocation { invoice_id: second, amount: dec!(200) },
            ]
        );
    }

    #[test]
    fn test_plan_with_no_funds_is_empty() {
        let invoices = vec![outstanding(InvoiceId::new(), dec!(100), 1)];
        assert!(plan_auto_allocation(dec!(0), &invoices).is_empty());
    }

    #[test]
    fn test_plan_skips_settled_invoices() {
        let open = InvoiceId::new();
        let invoices = vec![
            outstanding(InvoiceId::new(), dec!(0), 1),
            outstanding(open, dec!(250), 2),
        ];
        let plan = plan_auto_allocation(dec!(100), &invoices);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].invoice_id, open);
        assert_eq!(plan[0].amount, dec!(100));
    }

    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The planned total never exceeds the available funds, and no
        /// invoice is over-settled.
        #[test]
        fn prop_plan_respects_caps(
            funds in amount_strategy(),
            amounts in prop::collection::vec(amount_strategy(), 1..15),
        ) {
            let invoices: Vec<OutstandingInvoice> = amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| outstanding(InvoiceId::new(), *amount, i as i64))
                .collect();

            let plan = plan_auto_allocation(funds, &invoices);

            let total: Decimal = plan.iter().map(|p| p.amount).sum();
            prop_assert!(total <= funds);

            for planned in &plan {
                let invoice = invoices.iter().find(|i| i.id == planned.invoice_id).unwrap();
                prop_assert!(planned.amount <= invoice.outstanding);
                prop_assert!(planned.amount > Decimal::ZERO);
            }
        }

        /// The plan settles strictly in the given order: an invoice only
        /// receives funds once every earlier invoice is fully settled.
        #[test]
        fn prop_plan_is_prefix_greedy(
            funds in amount_strategy(),
            amounts in prop::collection::vec(amount_strategy(), 1..15),
        ) {
            let invoices: Vec<OutstandingInvoice> = amounts
                .iter()
                .enumerate()
                .map(|(i, amount)| outstanding(InvoiceId::new(), *amount, i as i64))
                .collect();

            let plan = plan_auto_allocation(funds, &invoices);

            // Every planned allocation except possibly the last settles
            // its invoice in full.
            for planned in plan.iter().rev().skip(1) {
                let invoice = invoices.iter().find(|i| i.id == planned.invoice_id).unwrap();
                prop_assert_eq!(planned.amount, invoice.outstanding);
            }
        }

        /// A batch that passes validation fits all caps when applied.
        #[test]
        fn prop_valid_batch_fits_caps(
            outstanding_cap in amount_strategy(),
            remaining_cap in amount_strategy(),
            parts in prop::collection::vec(amount_strategy(), 1..8),
        ) {
            let invoice = InvoiceId::new();
            let receipt = ReceiptId::new();
            let requests: Vec<AllocationRequest> = parts
                .iter()
                .map(|amount| request(invoice, receipt, *amount))
                .collect();
            let invoice_caps = HashMap::from([(invoice, outstanding_cap)]);
            let receipt_caps = HashMap::from([(receipt, remaining_cap)]);

            let total: Decimal = parts.iter().copied().sum();
            let result = validate_batch(&requests, &invoice_caps, &receipt_caps);

            if total <= outstanding_cap && total <= remaining_cap {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }
}
