//! Totals engine.
//!
//! A pure function from (line items, tax rate, amount paid) to the invoice's
//! monetary fields. It is always fed the full current line item list rather
//! than incremental deltas, so repeated add/remove cycles cannot accumulate
//! rounding error.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::money::{ensure_storable, line_total, round_currency, sum_currency};
use crate::core::{AppError, Result};
use crate::modules::invoices::models::LineItem;

/// Anything that can be billed as quantity × unit price
pub trait Billable {
    fn quantity(&self) -> Decimal;
    fn unit_price(&self) -> Decimal;
}

impl Billable for LineItem {
    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}

impl Billable for (Decimal, Decimal) {
    fn quantity(&self) -> Decimal {
        self.0
    }

    fn unit_price(&self) -> Decimal {
        self.1
    }
}

/// Monetary fields of an invoice, all at currency precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    /// Signed; negative when the invoice is overpaid
    pub amount_due: Decimal,
}

/// Compute invoice totals
///
/// Formula:
/// - line_total = round2(quantity × unit_price)
/// - subtotal = Σ line_total
/// - tax_amount = round2(subtotal × tax_rate)
/// - total = subtotal + tax_amount
/// - amount_due = round2(total - amount_paid)
///
/// Fails with `Validation` when a result no longer fits the monetary columns.
pub fn compute_totals<B: Billable>(
    lines: &[B],
    tax_rate: Decimal,
    amount_paid: Decimal,
) -> Result<Totals> {
    let line_totals = lines
        .iter()
        .map(|line| line_total(line.quantity(), line.unit_price()))
        .collect::<Result<Vec<_>>>()?;
    let subtotal = sum_currency(line_totals)?;

    let tax_amount = round_currency(
        subtotal
            .checked_mul(tax_rate)
            .ok_or_else(|| AppError::invariant("tax amount overflowed"))?,
    );
    let total = sum_currency([subtotal, tax_amount])?;
    let amount_paid = round_currency(amount_paid);
    let amount_due = round_currency(
        total
            .checked_sub(amount_paid)
            .ok_or_else(|| AppError::invariant("amount due overflowed"))?,
    );

    ensure_storable("Invoice total", total)?;
    ensure_storable("Amount paid", amount_paid)?;
    ensure_storable("Amount due", amount_due)?;

    Ok(Totals {
        subtotal,
        tax_amount,
        total,
        amount_paid,
        amount_due,
    })
}

impl Totals {
    /// Check the reconciliation invariants before anything is persisted.
    ///
    /// `payments_sum` is the sum of the payment ledger the totals were
    /// computed from.
    pub fn verify(&self, payments_sum: Decimal) -> Result<()> {
        if self.total != self.subtotal + self.tax_amount {
            return Err(AppError::invariant(format!(
                "total {} != subtotal {} + tax {}",
                self.total, self.subtotal, self.tax_amount
            )));
        }

        if self.amount_due != self.total - self.amount_paid {
            return Err(AppError::invariant(format!(
                "amount_due {} != total {} - amount_paid {}",
                self.amount_due, self.total, self.amount_paid
            )));
        }

        if self.amount_paid != payments_sum {
            return Err(AppError::invariant(format!(
                "amount_paid {} diverges from payment sum {}",
                self.amount_paid, payments_sum
            )));
        }

        Ok(())
    }
}
