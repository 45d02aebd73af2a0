// Integration tests for payment recording and deletion

#[path = "../helpers/mod.rs"]
mod helpers;

use billing_engine::core::AppError;
use billing_engine::activities::ActivityType;
use billing_engine::invoices::models::{InvoiceStatus, SetStatusRequest};
use billing_engine::payments::{PaymentMethod, RecordPaymentRequest};
use chrono::{Duration, Utc};
use helpers::*;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_record_then_delete_restores_balance() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let recorded = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(33.33)))
        .await
        .unwrap();
    assert_eq!(recorded.invoice.amount_due, dec!(76.67));

    let deleted = service
        .delete_payment(&invoice.id, &recorded.entity.id)
        .await
        .unwrap();

    assert_eq!(deleted.invoice.amount_paid, invoice.amount_paid);
    assert_eq!(deleted.invoice.amount_due, invoice.amount_due);
    assert_eq!(deleted.status, InvoiceStatus::Sent);
}

#[tokio::test]
async fn test_deleting_last_payment_on_reopened_draft_settles_to_sent() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let recorded = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(60.00)))
        .await
        .unwrap();
    service
        .set_status(
            &invoice.id,
            SetStatusRequest {
                status: InvoiceStatus::Draft,
            },
        )
        .await
        .unwrap();

    let deleted = service
        .delete_payment(&invoice.id, &recorded.entity.id)
        .await
        .unwrap();

    assert_eq!(deleted.previous_status, InvoiceStatus::Draft);
    assert_eq!(deleted.status, InvoiceStatus::Sent);
    assert_eq!(deleted.invoice.amount_paid, dec!(0.00));

    let activities = service.list_activity(&invoice.id).await.unwrap();
    let changes = activities_of(&activities, ActivityType::InvoiceStatusChanged);
    assert_eq!(changes[0].payload["from"], "DRAFT");
    assert_eq!(changes[0].payload["to"], "SENT");
}

#[tokio::test]
async fn test_oversized_payment_is_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let result = service
        .record_payment(
            &invoice.id,
            TestDataFactory::payment(dec!(100000000000000000000)),
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert!(detail.payments.is_empty());
    assert_eq!(detail.invoice.version, invoice.version);
}

#[tokio::test]
async fn test_many_small_payments_sum_exactly() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    // 11 × 10.00 = 110.00, the last one settles the invoice
    for i in 0..11 {
        let outcome = service
            .record_payment(&invoice.id, TestDataFactory::payment(dec!(10.00)))
            .await
            .unwrap();
        let expected = if i < 10 {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Paid
        };
        assert_eq!(outcome.status, expected);
    }

    assert_paid_matches_ledger(&service, &invoice.id).await;
    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(detail.invoice.amount_due, dec!(0.00));
}

#[tokio::test]
async fn test_overpayment_surfaces_negative_amount_due() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let outcome = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(200.00)))
        .await
        .unwrap();

    assert_eq!(outcome.invoice.amount_due, dec!(-90.00));
    assert_eq!(outcome.status, InvoiceStatus::Paid);
    assert_reconciled(&outcome.invoice);
}

#[tokio::test]
async fn test_payments_listed_by_paid_at() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;
    let now = Utc::now();

    let later = service
        .record_payment(
            &invoice.id,
            RecordPaymentRequest {
                amount: dec!(5.00),
                method: PaymentMethod::Cash,
                paid_at: Some(now),
            },
        )
        .await
        .unwrap();
    let earlier = service
        .record_payment(
            &invoice.id,
            RecordPaymentRequest {
                amount: dec!(7.00),
                method: PaymentMethod::Card,
                paid_at: Some(now - Duration::days(2)),
            },
        )
        .await
        .unwrap();

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    let ids: Vec<&str> = detail.payments.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![earlier.entity.id.as_str(), later.entity.id.as_str()]);
}

#[tokio::test]
async fn test_invalid_amounts_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    for amount in [dec!(0), dec!(-5.00), dec!(1.001)] {
        let result = service
            .record_payment(&invoice.id, TestDataFactory::payment(amount))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert!(detail.payments.is_empty());
}

#[tokio::test]
async fn test_delete_payment_twice_is_not_found() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;

    let recorded = service
        .record_payment(&invoice.id, TestDataFactory::payment(dec!(10.00)))
        .await
        .unwrap();
    service
        .delete_payment(&invoice.id, &recorded.entity.id)
        .await
        .unwrap();

    let result = service.delete_payment(&invoice.id, &recorded.entity.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_payment_of_other_invoice_is_not_found() {
    let service = TestDataFactory::service();
    let first = TestDataFactory::sent_invoice(&service).await;
    let second = TestDataFactory::sent_invoice(&service).await;

    let recorded = service
        .record_payment(&first.id, TestDataFactory::payment(dec!(10.00)))
        .await
        .unwrap();

    let result = service.delete_payment(&second.id, &recorded.entity.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
