// Invoice state machine.
//
// Every mutation follows the same unit of work:
// 1. Load the invoice, then its line items and payments
// 2. Apply the change to the owning ledger
// 3. Recompute totals from the full ledgers and verify them
// 4. Settle the status and queue audit records
// 5. Commit ledger change + invoice + audit records, conditional on version
//
// Nothing is written until step 5, so a failure anywhere earlier leaves the
// invoice untouched.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::core::money;
use crate::core::{AppError, Result};
use crate::modules::activities::models::{ActivityEvent, InvoiceActivity};
use crate::modules::activities::services::AuditTrail;
use crate::modules::invoices::models::{
    AddLineItemRequest, CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceStatus, LineItem,
    MutationOutcome, SetStatusRequest, UpdateLineItemRequest, UpdateTaxRateRequest,
};
use crate::modules::invoices::repositories::{InvoiceChangeSet, InvoiceStore, LedgerChange};
use crate::modules::invoices::services::lifecycle::derive_payment_status;
use crate::modules::invoices::services::line_item_ledger::LineItemLedger;
use crate::modules::invoices::services::totals::{compute_totals, Totals};
use crate::modules::payments::models::{Payment, RecordPaymentRequest};
use crate::modules::payments::services::PaymentLedger;

/// Freshly loaded invoice state
struct Snapshot {
    invoice: Invoice,
    line_items: Vec<LineItem>,
    payments: Vec<Payment>,
}

pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    default_tax_rate: Decimal,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>, default_tax_rate: Decimal) -> Self {
        Self {
            store,
            default_tax_rate,
        }
    }

    pub fn store(&self) -> &Arc<dyn InvoiceStore> {
        &self.store
    }

    /// Create a DRAFT invoice with zeroed totals
    pub async fn create_invoice(&self, request: CreateInvoiceRequest) -> Result<Invoice> {
        let tax_rate = request.tax_rate.unwrap_or(self.default_tax_rate);
        let invoice = Invoice::new_draft(&request, tax_rate)?;

        let mut trail = AuditTrail::new(&invoice.id);
        trail.append(ActivityEvent::InvoiceCreated {
            contact_id: invoice.contact_id.clone(),
            booking_id: invoice.booking_id.clone(),
            tax_rate: invoice.tax_rate,
        });

        let created = self
            .store
            .insert_invoice(&invoice, &trail.into_entries())
            .await?;

        tracing::info!(
            invoice_id = %created.id,
            contact_id = %created.contact_id,
            tax_rate = %created.tax_rate,
            "Invoice created"
        );

        Ok(created)
    }

    /// Invoice with line items (by sort order) and payments (by paid_at)
    pub async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceDetail> {
        let snapshot = self.load(invoice_id).await?;

        Ok(InvoiceDetail {
            invoice: snapshot.invoice,
            line_items: snapshot.line_items,
            payments: snapshot.payments,
        })
    }

    /// Audit history, newest first
    pub async fn list_activity(&self, invoice_id: &str) -> Result<Vec<InvoiceActivity>> {
        self.find(invoice_id).await?;
        self.store.list_activities(invoice_id).await
    }

    pub async fn add_line_item(
        &self,
        invoice_id: &str,
        request: AddLineItemRequest,
    ) -> Result<MutationOutcome<LineItem>> {
        let snapshot = self.load(invoice_id).await?;
        let mut ledger = LineItemLedger::new(&snapshot.invoice, snapshot.line_items.clone());
        let line_item = ledger.add(&request)?;

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        let totals = reconcile(&mut next, ledger.items(), &payments)?;

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::LineItemAdded {
            line_item: line_item.clone(),
            totals,
        });

        let invoice = self
            .commit(
                "add_line_item",
                next,
                vec![LedgerChange::InsertLineItem(line_item.clone())],
                trail,
            )
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            line_item_id = %line_item.id,
            total = %invoice.total,
            "Line item added"
        );

        Ok(outcome(&snapshot.invoice, invoice, line_item))
    }

    pub async fn update_line_item(
        &self,
        invoice_id: &str,
        line_item_id: &str,
        request: UpdateLineItemRequest,
    ) -> Result<MutationOutcome<LineItem>> {
        if request.is_empty() {
            return Err(AppError::validation("No line item fields to update"));
        }

        let snapshot = self.load(invoice_id).await?;
        let mut ledger = LineItemLedger::new(&snapshot.invoice, snapshot.line_items.clone());
        let (before, after) = ledger.update(line_item_id, &request)?;

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        let totals = reconcile(&mut next, ledger.items(), &payments)?;

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::LineItemUpdated {
            before,
            after: after.clone(),
            totals,
        });

        let invoice = self
            .commit(
                "update_line_item",
                next,
                vec![LedgerChange::UpdateLineItem(after.clone())],
                trail,
            )
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            line_item_id = %after.id,
            total = %invoice.total,
            "Line item updated"
        );

        Ok(outcome(&snapshot.invoice, invoice, after))
    }

    pub async fn remove_line_item(
        &self,
        invoice_id: &str,
        line_item_id: &str,
    ) -> Result<MutationOutcome<LineItem>> {
        let snapshot = self.load(invoice_id).await?;
        let mut ledger = LineItemLedger::new(&snapshot.invoice, snapshot.line_items.clone());
        let removed = ledger.remove(line_item_id)?;

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        let totals = reconcile(&mut next, ledger.items(), &payments)?;

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::LineItemRemoved {
            line_item: removed.clone(),
            totals,
        });

        let invoice = self
            .commit(
                "remove_line_item",
                next,
                vec![LedgerChange::DeleteLineItem {
                    line_item_id: removed.id.clone(),
                }],
                trail,
            )
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            line_item_id = %removed.id,
            total = %invoice.total,
            "Line item removed"
        );

        Ok(outcome(&snapshot.invoice, invoice, removed))
    }

    /// Change the tax rate of a draft; a no-op when the rate is unchanged
    pub async fn update_tax_rate(
        &self,
        invoice_id: &str,
        request: UpdateTaxRateRequest,
    ) -> Result<MutationOutcome> {
        money::validate_tax_rate(request.tax_rate)?;

        let snapshot = self.load(invoice_id).await?;
        if !snapshot.invoice.is_editable() {
            return Err(AppError::invalid_state(format!(
                "Tax rate can only be changed on DRAFT invoices (invoice '{}' is {})",
                invoice_id, snapshot.invoice.status
            )));
        }

        if snapshot.invoice.tax_rate == request.tax_rate {
            return Ok(outcome(&snapshot.invoice, snapshot.invoice.clone(), ()));
        }

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        next.tax_rate = request.tax_rate;
        let totals = reconcile(&mut next, &snapshot.line_items, &payments)?;

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::TaxRateChanged {
            from: snapshot.invoice.tax_rate,
            to: request.tax_rate,
            totals,
        });

        let invoice = self.commit("update_tax_rate", next, vec![], trail).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            from = %snapshot.invoice.tax_rate,
            to = %invoice.tax_rate,
            "Tax rate changed"
        );

        Ok(outcome(&snapshot.invoice, invoice, ()))
    }

    /// DRAFT -> SENT
    pub async fn send(&self, invoice_id: &str) -> Result<MutationOutcome> {
        let snapshot = self.load(invoice_id).await?;
        if snapshot.invoice.status != InvoiceStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Only DRAFT invoices can be sent (invoice '{}' is {})",
                invoice_id, snapshot.invoice.status
            )));
        }

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        reconcile(&mut next, &snapshot.line_items, &payments)?;

        let sent_at = Utc::now();
        next.status = InvoiceStatus::Sent;
        next.sent_at = Some(sent_at);

        let mut trail = AuditTrail::new(invoice_id);
        trail.status_transition(snapshot.invoice.status, next.status);
        trail.append(ActivityEvent::InvoiceSent {
            sent_at,
            total: next.total,
        });

        let invoice = self.commit("send", next, vec![], trail).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            from = %snapshot.invoice.status,
            to = %invoice.status,
            total = %invoice.total,
            "Invoice sent"
        );

        Ok(outcome(&snapshot.invoice, invoice, ()))
    }

    pub async fn record_payment(
        &self,
        invoice_id: &str,
        request: RecordPaymentRequest,
    ) -> Result<MutationOutcome<Payment>> {
        let snapshot = self.load(invoice_id).await?;
        let mut payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let payment = payments.record(&request)?;

        let mut next = snapshot.invoice.clone();
        let totals = reconcile(&mut next, &snapshot.line_items, &payments)?;
        next.status = derive_payment_status(&totals);

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::PaymentRecorded {
            payment: payment.clone(),
            totals,
        });
        trail.status_transition(snapshot.invoice.status, next.status);

        let invoice = self
            .commit(
                "record_payment",
                next,
                vec![LedgerChange::InsertPayment(payment.clone())],
                trail,
            )
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            amount = %payment.amount,
            amount_due = %invoice.amount_due,
            status = %invoice.status,
            "Payment recorded"
        );

        if invoice.is_overpaid() {
            tracing::warn!(
                invoice_id = %invoice.id,
                amount_due = %invoice.amount_due,
                "Invoice is overpaid"
            );
        }

        Ok(outcome(&snapshot.invoice, invoice, payment))
    }

    pub async fn delete_payment(
        &self,
        invoice_id: &str,
        payment_id: &str,
    ) -> Result<MutationOutcome<Payment>> {
        let snapshot = self.load(invoice_id).await?;
        let mut payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let removed = payments.delete(payment_id)?;

        let mut next = snapshot.invoice.clone();
        let totals = reconcile(&mut next, &snapshot.line_items, &payments)?;
        next.status = derive_payment_status(&totals);

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::PaymentDeleted {
            payment: removed.clone(),
            totals,
        });
        trail.status_transition(snapshot.invoice.status, next.status);

        let invoice = self
            .commit(
                "delete_payment",
                next,
                vec![LedgerChange::DeletePayment {
                    payment_id: removed.id.clone(),
                }],
                trail,
            )
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %removed.id,
            amount = %removed.amount,
            amount_due = %invoice.amount_due,
            status = %invoice.status,
            "Payment deleted"
        );

        Ok(outcome(&snapshot.invoice, invoice, removed))
    }

    /// Operator override. Re-requesting the current status writes nothing.
    pub async fn set_status(
        &self,
        invoice_id: &str,
        request: SetStatusRequest,
    ) -> Result<MutationOutcome> {
        let snapshot = self.load(invoice_id).await?;
        if snapshot.invoice.status == request.status {
            return Ok(outcome(&snapshot.invoice, snapshot.invoice.clone(), ()));
        }

        let payments = PaymentLedger::new(&snapshot.invoice, snapshot.payments.clone());
        let mut next = snapshot.invoice.clone();
        reconcile(&mut next, &snapshot.line_items, &payments)?;
        next.status = request.status;

        let mut trail = AuditTrail::new(invoice_id);
        trail.status_transition(snapshot.invoice.status, next.status);

        let invoice = self.commit("set_status", next, vec![], trail).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            from = %snapshot.invoice.status,
            to = %invoice.status,
            "Invoice status overridden"
        );

        Ok(outcome(&snapshot.invoice, invoice, ()))
    }

    /// Soft delete; the audit trail is kept
    pub async fn delete_invoice(&self, invoice_id: &str) -> Result<()> {
        let invoice = self.find(invoice_id).await?;

        let deleted_at = Utc::now();
        let mut next = invoice.clone();
        next.deleted_at = Some(deleted_at);

        let mut trail = AuditTrail::new(invoice_id);
        trail.append(ActivityEvent::InvoiceDeleted { deleted_at });

        self.commit("delete_invoice", next, vec![], trail).await?;

        tracing::info!(invoice_id = %invoice_id, status = %invoice.status, "Invoice deleted");

        Ok(())
    }

    async fn find(&self, invoice_id: &str) -> Result<Invoice> {
        self.store
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice_id)))
    }

    /// The invoice is read first; its version guards the ledgers read after it
    async fn load(&self, invoice_id: &str) -> Result<Snapshot> {
        let invoice = self.find(invoice_id).await?;

        let (line_items, payments) = futures_util::try_join!(
            self.store.list_line_items(invoice_id),
            self.store.list_payments(invoice_id)
        )?;

        Ok(Snapshot {
            invoice,
            line_items,
            payments,
        })
    }

    async fn commit(
        &self,
        operation: &'static str,
        invoice: Invoice,
        ledger: Vec<LedgerChange>,
        trail: AuditTrail,
    ) -> Result<Invoice> {
        let invoice_id = invoice.id.clone();
        let changeset = InvoiceChangeSet {
            invoice,
            ledger,
            activities: trail.into_entries(),
        };

        self.store.commit(changeset).await.map_err(|e| {
            if let AppError::Conflict(message) = &e {
                tracing::warn!(invoice_id = %invoice_id, operation, %message, "Commit rejected");
            }
            e
        })
    }
}

/// Recompute totals from the full ledgers, verify them and copy them onto
/// `invoice`
fn reconcile(
    invoice: &mut Invoice,
    line_items: &[LineItem],
    payments: &PaymentLedger,
) -> Result<Totals> {
    let amount_paid = payments.amount_paid()?;
    let totals = compute_totals(line_items, invoice.tax_rate, amount_paid)?;

    if let Err(e) = totals.verify(amount_paid) {
        tracing::error!(invoice_id = %invoice.id, error = %e, "Totals failed reconciliation");
        return Err(e);
    }

    invoice.apply_totals(&totals);
    Ok(totals)
}

fn outcome<T>(previous: &Invoice, invoice: Invoice, entity: T) -> MutationOutcome<T> {
    MutationOutcome {
        previous_status: previous.status,
        status: invoice.status,
        invoice,
        entity,
    }
}
