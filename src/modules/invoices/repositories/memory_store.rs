// In-memory record store.
//
// Used by the test suites and for local runs without MySQL. A single write
// lock around the whole state makes every commit atomic; the version check
// gives the same conflict semantics as the MySQL store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::invoice_store::{InvoiceChangeSet, InvoiceStore, LedgerChange};
use crate::core::{AppError, Result};
use crate::modules::activities::models::{InvoiceActivity, NewActivity};
use crate::modules::invoices::models::{Invoice, LineItem};
use crate::modules::payments::models::Payment;

#[derive(Debug, Clone)]
struct StoredPayment {
    payment: Payment,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    invoices: HashMap<String, Invoice>,
    line_items: HashMap<String, Vec<LineItem>>,
    payments: HashMap<String, Vec<StoredPayment>>,
    activities: HashMap<String, Vec<InvoiceActivity>>,
    next_sequence: i64,
}

impl MemoryState {
    fn live_invoice(&self, invoice_id: &str) -> Option<&Invoice> {
        self.invoices
            .get(invoice_id)
            .filter(|invoice| !invoice.is_deleted())
    }

    fn append_activities(&mut self, activities: &[NewActivity]) {
        for activity in activities {
            self.next_sequence += 1;
            self.activities
                .entry(activity.invoice_id.clone())
                .or_default()
                .push(InvoiceActivity {
                    id: activity.id.clone(),
                    invoice_id: activity.invoice_id.clone(),
                    sequence: self.next_sequence,
                    activity_type: activity.activity_type,
                    payload: activity.payload.clone(),
                    created_at: activity.created_at,
                });
        }
    }

    /// Reject changes that would not apply cleanly, before anything is touched
    fn check(&self, invoice_id: &str, change: &LedgerChange) -> Result<()> {
        let line_items = self.line_items.get(invoice_id);
        let has_line_item =
            |id: &str| line_items.is_some_and(|items| items.iter().any(|item| item.id == id));
        let has_payment = |id: &str| {
            self.payments.get(invoice_id).is_some_and(|payments| {
                payments
                    .iter()
                    .any(|stored| stored.payment.id == id && stored.deleted_at.is_none())
            })
        };

        match change {
            LedgerChange::InsertLineItem(item) if has_line_item(&item.id) => Err(
                AppError::conflict(format!("Line item '{}' already exists", item.id)),
            ),
            LedgerChange::UpdateLineItem(item) if !has_line_item(&item.id) => Err(
                AppError::not_found(format!("Line item '{}' not found", item.id)),
            ),
            LedgerChange::DeleteLineItem { line_item_id } if !has_line_item(line_item_id) => Err(
                AppError::not_found(format!("Line item '{}' not found", line_item_id)),
            ),
            LedgerChange::InsertPayment(payment) if has_payment(&payment.id) => Err(
                AppError::conflict(format!("Payment '{}' already exists", payment.id)),
            ),
            LedgerChange::DeletePayment { payment_id } if !has_payment(payment_id) => Err(
                AppError::not_found(format!("Payment '{}' not found", payment_id)),
            ),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, invoice_id: &str, change: LedgerChange, now: DateTime<Utc>) {
        match change {
            LedgerChange::InsertLineItem(item) => {
                self.line_items
                    .entry(invoice_id.to_string())
                    .or_default()
                    .push(item);
            }
            LedgerChange::UpdateLineItem(updated) => {
                if let Some(items) = self.line_items.get_mut(invoice_id) {
                    if let Some(item) = items.iter_mut().find(|item| item.id == updated.id) {
                        *item = updated;
                    }
                }
            }
            LedgerChange::DeleteLineItem { line_item_id } => {
                if let Some(items) = self.line_items.get_mut(invoice_id) {
                    items.retain(|item| item.id != line_item_id);
                }
            }
            LedgerChange::InsertPayment(payment) => {
                self.payments
                    .entry(invoice_id.to_string())
                    .or_default()
                    .push(StoredPayment {
                        payment,
                        deleted_at: None,
                    });
            }
            LedgerChange::DeletePayment { payment_id } => {
                if let Some(payments) = self.payments.get_mut(invoice_id) {
                    if let Some(stored) = payments
                        .iter_mut()
                        .find(|stored| stored.payment.id == payment_id)
                    {
                        stored.deleted_at = Some(now);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    state: RwLock<MemoryState>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        activities: &[NewActivity],
    ) -> Result<Invoice> {
        let mut state = self.state.write().await;

        if state.invoices.contains_key(&invoice.id) {
            return Err(AppError::conflict(format!(
                "Invoice '{}' already exists",
                invoice.id
            )));
        }

        state.invoices.insert(invoice.id.clone(), invoice.clone());
        state.append_activities(activities);

        Ok(invoice.clone())
    }

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        let state = self.state.read().await;
        Ok(state.live_invoice(invoice_id).cloned())
    }

    async fn list_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>> {
        let state = self.state.read().await;
        let mut items = state.line_items.get(invoice_id).cloned().unwrap_or_default();
        items.sort_by_key(|item| item.sort_order);
        Ok(items)
    }

    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .get(invoice_id)
            .map(|payments| {
                payments
                    .iter()
                    .filter(|stored| stored.deleted_at.is_none())
                    .map(|stored| stored.payment.clone())
                    .collect()
            })
            .unwrap_or_default();
        payments.sort_by_key(|payment| payment.paid_at);
        Ok(payments)
    }

    async fn list_activities(&self, invoice_id: &str) -> Result<Vec<InvoiceActivity>> {
        let state = self.state.read().await;
        let mut activities = state.activities.get(invoice_id).cloned().unwrap_or_default();
        activities.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        Ok(activities)
    }

    async fn commit(&self, changeset: InvoiceChangeSet) -> Result<Invoice> {
        let mut state = self.state.write().await;
        let invoice_id = changeset.invoice.id.clone();

        let stored_version = state
            .live_invoice(&invoice_id)
            .map(|invoice| invoice.version)
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice_id)))?;

        if stored_version != changeset.expected_version() {
            return Err(AppError::conflict(format!(
                "Invoice '{}' was modified concurrently (expected version {}, found {})",
                invoice_id,
                changeset.expected_version(),
                stored_version
            )));
        }

        for change in &changeset.ledger {
            state.check(&invoice_id, change)?;
        }

        let now = Utc::now();
        for change in changeset.ledger {
            state.apply(&invoice_id, change, now);
        }

        let mut invoice = changeset.invoice;
        invoice.version += 1;
        invoice.updated_at = now;
        state.invoices.insert(invoice_id, invoice.clone());
        state.append_activities(&changeset.activities);

        Ok(invoice)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
