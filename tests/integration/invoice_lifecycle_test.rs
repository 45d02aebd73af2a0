// Integration test for the invoice lifecycle
//
// Walks one invoice through DRAFT -> SENT -> PARTIALLY_PAID -> PAID and back,
// checking totals, status and audit records at every step.

#[path = "../helpers/mod.rs"]
mod helpers;

use billing_engine::activities::ActivityType;
use billing_engine::core::AppError;
use billing_engine::invoices::models::{InvoiceStatus, SetStatusRequest};
use helpers::*;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_reference_scenario() {
    let service = TestDataFactory::service();

    // Step 1: Draft with one line {2, 50.00} at 10% tax
    let draft = TestDataFactory::draft_invoice(&service).await;
    assert_eq!(draft.status, InvoiceStatus::Draft);
    assert_eq!(draft.subtotal, dec!(100.00));
    assert_eq!(draft.tax_amount, dec!(10.00));
    assert_eq!(draft.total, dec!(110.00));
    assert_eq!(draft.amount_due, dec!(110.00));

    // Step 2: Send
    let sent = service.send(&draft.id).await.unwrap();
    assert_eq!(sent.previous_status, InvoiceStatus::Draft);
    assert_eq!(sent.status, InvoiceStatus::Sent);

    // Step 3: Partial payment
    let first = service
        .record_payment(&draft.id, TestDataFactory::payment(dec!(60.00)))
        .await
        .unwrap();
    assert_eq!(first.invoice.amount_paid, dec!(60.00));
    assert_eq!(first.invoice.amount_due, dec!(50.00));
    assert_eq!(first.status, InvoiceStatus::PartiallyPaid);

    // Step 4: Settle
    let second = service
        .record_payment(&draft.id, TestDataFactory::payment(dec!(50.00)))
        .await
        .unwrap();
    assert_eq!(second.invoice.amount_due, dec!(0.00));
    assert_eq!(second.status, InvoiceStatus::Paid);

    // Step 5: Delete the second payment
    let reverted = service
        .delete_payment(&draft.id, &second.entity.id)
        .await
        .unwrap();
    assert_eq!(reverted.invoice.amount_paid, dec!(60.00));
    assert_eq!(reverted.invoice.amount_due, dec!(50.00));
    assert_eq!(reverted.status, InvoiceStatus::PartiallyPaid);

    assert_paid_matches_ledger(&service, &draft.id).await;
}

#[tokio::test]
async fn test_deleting_all_payments_returns_to_sent() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let payment = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(110.00)))
        .await
        .unwrap();
    assert_eq!(payment.status, InvoiceStatus::Paid);

    let outcome = service
        .delete_payment(&invoice.id, &payment.entity.id)
        .await
        .unwrap();

    assert_eq!(outcome.status, InvoiceStatus::Sent);
    assert_eq!(outcome.invoice.amount_paid, dec!(0.00));
    assert_eq!(outcome.invoice.amount_due, dec!(110.00));
}

#[tokio::test]
async fn test_payment_on_draft_is_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let result = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(10.00)))
        .await;

    assert!(matches!(result, Err(AppError::InvalidState(_))));

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert!(detail.payments.is_empty());
    assert_eq!(detail.invoice.amount_paid, dec!(0.00));
}

#[tokio::test]
async fn test_send_records_sent_at_and_audit() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    assert!(invoice.sent_at.is_some());

    let activities = service.list_activity(&invoice.id).await.unwrap();
    let sent = activities_of(&activities, ActivityType::InvoiceSent);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload["total"], "110.00");
}

#[tokio::test]
async fn test_set_status_override() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let outcome = service
        .set_status(
            &invoice.id,
            SetStatusRequest {
                status: InvoiceStatus::Paid,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.previous_status, InvoiceStatus::Sent);
    assert_eq!(outcome.status, InvoiceStatus::Paid);
    // Override does not touch the money
    assert_eq!(outcome.invoice.amount_due, dec!(110.00));
    assert_reconciled(&outcome.invoice);
}

#[tokio::test]
async fn test_override_back_to_draft_reopens_line_items() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    service
        .set_status(
            &invoice.id,
            SetStatusRequest {
                status: InvoiceStatus::Draft,
            },
        )
        .await
        .unwrap();

    let outcome = service
        .add_line_item(
            &invoice.id,
            TestDataFactory::line_item("Follow-up", dec!(1), dec!(25.00)),
        )
        .await
        .unwrap();

    assert_eq!(outcome.invoice.subtotal, dec!(125.00));
    assert_eq!(outcome.invoice.total, dec!(137.50));
}

#[tokio::test]
async fn test_tax_rate_change_recomputes_draft() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let outcome = service
        .update_tax_rate(
            &invoice.id,
            billing_engine::invoices::models::UpdateTaxRateRequest {
                tax_rate: dec!(0.0825),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.invoice.tax_amount, dec!(8.25));
    assert_eq!(outcome.invoice.total, dec!(108.25));

    let activities = service.list_activity(&invoice.id).await.unwrap();
    let changed = activities_of(&activities, ActivityType::TaxRateChanged);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].payload["from"], "0.1");
    assert_eq!(changed[0].payload["to"], "0.0825");
}

#[tokio::test]
async fn test_tax_rate_locked_after_send() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let result = service
        .update_tax_rate(
            &invoice.id,
            billing_engine::invoices::models::UpdateTaxRateRequest {
                tax_rate: dec!(0.2),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_unknown_invoice_is_not_found() {
    let service = TestDataFactory::service();

    assert!(matches!(
        service.send("missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        service.get_invoice("missing").await,
        Err(AppError::NotFound(_))
    ));
}
