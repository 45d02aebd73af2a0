// Record store boundary.
//
// Reads are individually atomic. Writes go through `commit`, which applies a
// ledger change, the new invoice state and its audit records as ONE unit,
// conditional on the invoice still being at the version it was loaded at.

use async_trait::async_trait;

use crate::core::Result;
use crate::modules::activities::models::{InvoiceActivity, NewActivity};
use crate::modules::invoices::models::{Invoice, LineItem};
use crate::modules::payments::models::Payment;

/// A change to one of the invoice's owned ledgers
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    InsertLineItem(LineItem),
    UpdateLineItem(LineItem),
    DeleteLineItem { line_item_id: String },
    InsertPayment(Payment),
    DeletePayment { payment_id: String },
}

/// Everything one state machine operation writes
#[derive(Debug, Clone)]
pub struct InvoiceChangeSet {
    /// Next invoice state. `version` is the version it was loaded at.
    pub invoice: Invoice,
    pub ledger: Vec<LedgerChange>,
    pub activities: Vec<NewActivity>,
}

impl InvoiceChangeSet {
    pub fn expected_version(&self) -> i64 {
        self.invoice.version
    }
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persist a freshly created invoice together with its creation record
    async fn insert_invoice(&self, invoice: &Invoice, activities: &[NewActivity])
        -> Result<Invoice>;

    /// Find a live invoice; soft-deleted invoices are reported as absent
    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>>;

    /// Line items ordered by sort order
    async fn list_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>>;

    /// Non-deleted payments ordered by paid_at
    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<Payment>>;

    /// Activity records, newest first
    async fn list_activities(&self, invoice_id: &str) -> Result<Vec<InvoiceActivity>>;

    /// Atomically apply a change set.
    ///
    /// Fails with `Conflict` when the stored version no longer matches
    /// `changeset.expected_version()`, and with `NotFound` when the invoice
    /// is gone. On success returns the invoice at its new version.
    async fn commit(&self, changeset: InvoiceChangeSet) -> Result<Invoice>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;

    /// Short backend name reported by the readiness probe
    fn backend(&self) -> &'static str;
}
