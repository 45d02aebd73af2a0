// Payment-driven status derivation.
//
// Both payment paths (record and delete) settle the invoice status through
// `derive_payment_status`; nothing else decides PAID vs PARTIALLY_PAID.

use rust_decimal::Decimal;

use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::invoices::services::totals::Totals;

/// Status implied by the payment ledger.
///
/// - nothing paid -> SENT
/// - nothing due (including overpayment) -> PAID
/// - otherwise -> PARTIALLY_PAID
///
/// The result never depends on the current status, so a payment deletion on
/// an invoice an operator moved back to DRAFT still settles it from the ledger.
pub fn derive_payment_status(totals: &Totals) -> InvoiceStatus {
    if totals.amount_paid <= Decimal::ZERO {
        InvoiceStatus::Sent
    } else if totals.amount_due <= Decimal::ZERO {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::PartiallyPaid
    }
}
