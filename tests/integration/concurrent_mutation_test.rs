// Concurrency tests for optimistic commits
//
// A commit only lands if the invoice is still at the version it was loaded
// at. A losing writer gets Conflict and leaves nothing behind; retrying
// against fresh state converges.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use billing_engine::activities::{ActivityType, InvoiceActivity, NewActivity};
use billing_engine::core::{AppError, Result};
use billing_engine::invoices::models::{Invoice, InvoiceStatus, LineItem};
use billing_engine::invoices::repositories::InvoiceChangeSet;
use billing_engine::invoices::{InMemoryInvoiceStore, InvoiceService, InvoiceStore};
use billing_engine::payments::Payment;
use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Store that lets another writer win the race once, right before the next commit
struct RacingStore {
    inner: InMemoryInvoiceStore,
    armed: AtomicBool,
}

impl RacingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryInvoiceStore::new(),
            armed: AtomicBool::new(false),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl InvoiceStore for RacingStore {
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        activities: &[NewActivity],
    ) -> Result<Invoice> {
        self.inner.insert_invoice(invoice, activities).await
    }

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        self.inner.find_invoice(invoice_id).await
    }

    async fn list_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>> {
        self.inner.list_line_items(invoice_id).await
    }

    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        self.inner.list_payments(invoice_id).await
    }

    async fn list_activities(&self, invoice_id: &str) -> Result<Vec<InvoiceActivity>> {
        self.inner.list_activities(invoice_id).await
    }

    async fn commit(&self, changeset: InvoiceChangeSet) -> Result<Invoice> {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(current) = self.inner.find_invoice(&changeset.invoice.id).await? {
                self.inner
                    .commit(InvoiceChangeSet {
                        invoice: current,
                        ledger: vec![],
                        activities: vec![],
                    })
                    .await?;
            }
        }

        self.inner.commit(changeset).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

#[tokio::test]
async fn test_stale_commit_conflicts_without_partial_state() {
    let store = Arc::new(RacingStore::new());
    let service = TestDataFactory::service_with_store(store.clone());
    let invoice = TestDataFactory::sent_invoice(&service).await;
    let activities_before = service.list_activity(&invoice.id).await.unwrap().len();

    store.arm();
    let result = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(60.00)))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(result.as_ref().unwrap_err().is_retryable());

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert!(detail.payments.is_empty());
    assert_eq!(detail.invoice.amount_paid, dec!(0.00));
    assert_eq!(detail.invoice.status, InvoiceStatus::Sent);
    assert_eq!(
        service.list_activity(&invoice.id).await.unwrap().len(),
        activities_before
    );

    // A retry against fresh state succeeds
    let retried = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(60.00)))
        .await
        .unwrap();
    assert_eq!(retried.status, InvoiceStatus::PartiallyPaid);
}

async fn record_with_retry(service: &InvoiceService, invoice_id: &str, amount: Decimal) {
    loop {
        match service
            .record_payment(invoice_id, TestDataFactory::payment(amount))
            .await
        {
            Ok(_) => return,
            Err(e) if e.is_retryable() => tokio::task::yield_now().await,
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_converge() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let mut handles = Vec::new();
    for _ in 0..11 {
        let service = service.clone();
        let invoice_id = invoice.id.clone();
        handles.push(tokio::spawn(async move {
            record_with_retry(&service, &invoice_id, dec!(10.00)).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(detail.payments.len(), 11);
    assert_eq!(detail.invoice.amount_paid, dec!(110.00));
    assert_eq!(detail.invoice.amount_due, dec!(0.00));
    assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
    assert_paid_matches_ledger(&service, &invoice.id).await;

    let activities = service.list_activity(&invoice.id).await.unwrap();
    assert_eq!(activities_of(&activities, ActivityType::PaymentRecorded).len(), 11);
    // SENT -> PARTIALLY_PAID -> PAID, plus DRAFT -> SENT
    assert_eq!(
        activities_of(&activities, ActivityType::InvoiceStatusChanged).len(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_invoices_do_not_conflict() {
    let service = TestDataFactory::service();
    let first = TestDataFactory::sent_invoice(&service).await;
    let second = TestDataFactory::sent_invoice(&service).await;

    let a = {
        let service = service.clone();
        let id = first.id.clone();
        tokio::spawn(async move {
            service
                .record_payment(&id, TestDataFactory::payment(dec!(110.00)))
                .await
        })
    };
    let b = {
        let service = service.clone();
        let id = second.id.clone();
        tokio::spawn(async move {
            service
                .record_payment(&id, TestDataFactory::payment(dec!(50.00)))
                .await
        })
    };

    assert_eq!(a.await.unwrap().unwrap().status, InvoiceStatus::Paid);
    assert_eq!(b.await.unwrap().unwrap().status, InvoiceStatus::PartiallyPaid);
}
