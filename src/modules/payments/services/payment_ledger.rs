// Payment ledger.
//
// Owns the payments recorded against one invoice. amount_paid is always the
// exact sum of the payments currently in the ledger.

use rust_decimal::Decimal;

use crate::core::money::sum_currency;
use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};
use crate::modules::payments::models::{Payment, RecordPaymentRequest};

pub struct PaymentLedger {
    invoice_id: String,
    status: InvoiceStatus,
    payments: Vec<Payment>,
}

impl PaymentLedger {
    /// Build the ledger from the freshly loaded payments of `invoice`
    pub fn new(invoice: &Invoice, mut payments: Vec<Payment>) -> Self {
        payments.sort_by_key(|payment| payment.paid_at);

        Self {
            invoice_id: invoice.id.clone(),
            status: invoice.status,
            payments,
        }
    }

    /// Sum of all recorded payments at currency precision
    pub fn amount_paid(&self) -> Result<Decimal> {
        sum_currency(self.payments.iter().map(|payment| payment.amount))
    }

    /// Record a payment; only allowed once the invoice has been sent
    pub fn record(&mut self, request: &RecordPaymentRequest) -> Result<Payment> {
        if self.status == InvoiceStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Payments cannot be recorded against DRAFT invoice '{}'",
                self.invoice_id
            )));
        }

        let payment = Payment::new(
            &self.invoice_id,
            request.amount,
            request.method,
            request.paid_at,
        )?;

        self.payments.push(payment.clone());
        self.payments.sort_by_key(|payment| payment.paid_at);

        Ok(payment)
    }

    /// Remove a payment, reversing its effect on amount_paid
    pub fn delete(&mut self, payment_id: &str) -> Result<Payment> {
        let index = self
            .payments
            .iter()
            .position(|payment| payment.id == payment_id)
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Payment '{}' not found on invoice '{}'",
                    payment_id, self.invoice_id
                ))
            })?;

        let removed = self.payments.remove(index);

        if self.amount_paid()? < Decimal::ZERO {
            return Err(AppError::invariant(format!(
                "amount_paid went negative on invoice '{}'",
                self.invoice_id
            )));
        }

        Ok(removed)
    }
}
