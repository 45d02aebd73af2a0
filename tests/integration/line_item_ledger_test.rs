// Integration tests for line item mutations through the state machine

#[path = "../helpers/mod.rs"]
mod helpers;

use billing_engine::activities::ActivityType;
use billing_engine::core::AppError;
use billing_engine::invoices::models::{AddLineItemRequest, UpdateLineItemRequest};
use helpers::*;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_add_then_remove_restores_totals() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let added = service
        .add_line_item(
            &invoice.id,
            TestDataFactory::line_item("Materials", dec!(0.5), dec!(2.01)),
        )
        .await
        .unwrap();
    assert_eq!(added.entity.total, dec!(1.01));
    assert_eq!(added.invoice.subtotal, dec!(101.01));
    assert_reconciled(&added.invoice);

    let removed = service
        .remove_line_item(&invoice.id, &added.entity.id)
        .await
        .unwrap();

    assert_eq!(removed.invoice.subtotal, invoice.subtotal);
    assert_eq!(removed.invoice.tax_amount, invoice.tax_amount);
    assert_eq!(removed.invoice.total, invoice.total);
    assert_eq!(removed.invoice.amount_due, invoice.amount_due);
}

#[tokio::test]
async fn test_oversized_line_item_is_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let result = service
        .add_line_item(
            &invoice.id,
            TestDataFactory::line_item("Bulk", dec!(100000000000000000000), dec!(10000000000)),
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let existing = service.get_invoice(&invoice.id).await.unwrap().line_items[0].clone();
    let result = service
        .update_line_item(
            &invoice.id,
            &existing.id,
            UpdateLineItemRequest {
                quantity: Some(dec!(10000000000)),
                unit_price: Some(dec!(10000000000)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(detail.invoice.total, invoice.total);
    assert_eq!(detail.invoice.version, invoice.version);
}

#[tokio::test]
async fn test_sort_order_at_upper_limit_does_not_wrap() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    service
        .add_line_item(
            &invoice.id,
            AddLineItemRequest {
                sort_order: Some(i32::MAX),
                ..TestDataFactory::line_item("Last", dec!(1), dec!(1.00))
            },
        )
        .await
        .unwrap();

    let result = service
        .add_line_item(&invoice.id, TestDataFactory::line_item("After", dec!(1), dec!(1.00)))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(service.get_invoice(&invoice.id).await.unwrap().line_items.len(), 2);
}

#[tokio::test]
async fn test_sort_order_defaults_to_next_slot() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let explicit = service
        .add_line_item(
            &invoice.id,
            AddLineItemRequest {
                sort_order: Some(10),
                ..TestDataFactory::line_item("Explicit", dec!(1), dec!(1.00))
            },
        )
        .await
        .unwrap();
    assert_eq!(explicit.entity.sort_order, 10);

    let next = service
        .add_line_item(&invoice.id, TestDataFactory::line_item("Next", dec!(1), dec!(1.00)))
        .await
        .unwrap();
    assert_eq!(next.entity.sort_order, 11);

    let detail = service.get_invoice(&invoice.id).await.unwrap();
    let orders: Vec<i32> = detail.line_items.iter().map(|item| item.sort_order).collect();
    assert_eq!(orders, vec![0, 10, 11]);
}

#[tokio::test]
async fn test_duplicate_sort_order_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let result = service
        .add_line_item(
            &invoice.id,
            AddLineItemRequest {
                sort_order: Some(0),
                ..TestDataFactory::line_item("Clash", dec!(1), dec!(1.00))
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_update_recomputes_and_records_before_after() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;
    let line_item = service.get_invoice(&invoice.id).await.unwrap().line_items[0].clone();

    let outcome = service
        .update_line_item(
            &invoice.id,
            &line_item.id,
            UpdateLineItemRequest {
                quantity: Some(dec!(3)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.entity.total, dec!(150.00));
    assert_eq!(outcome.entity.description, line_item.description);
    assert_eq!(outcome.invoice.total, dec!(165.00));

    let activities = service.list_activity(&invoice.id).await.unwrap();
    let updated = activities_of(&activities, ActivityType::LineItemUpdated);
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].payload["before"]["quantity"], "2");
    assert_eq!(updated[0].payload["after"]["quantity"], "3");
    assert_eq!(updated[0].payload["totals"]["total"], "165.00");
}

#[tokio::test]
async fn test_line_items_locked_after_send() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::sent_invoice(&service).await;
    let line_item = service.get_invoice(&invoice.id).await.unwrap().line_items[0].clone();

    let add = service
        .add_line_item(&invoice.id, TestDataFactory::line_item("Late", dec!(1), dec!(5.00)))
        .await;
    let update = service
        .update_line_item(
            &invoice.id,
            &line_item.id,
            UpdateLineItemRequest {
                unit_price: Some(dec!(1.00)),
                ..Default::default()
            },
        )
        .await;
    let remove = service.remove_line_item(&invoice.id, &line_item.id).await;

    assert!(matches!(add, Err(AppError::InvalidState(_))));
    assert!(matches!(update, Err(AppError::InvalidState(_))));
    assert!(matches!(remove, Err(AppError::InvalidState(_))));

    // Totals unchanged
    let detail = service.get_invoice(&invoice.id).await.unwrap();
    assert_eq!(detail.invoice.total, invoice.total);
    assert_eq!(detail.invoice.version, invoice.version);
    assert_eq!(detail.line_items.len(), 1);
}

#[tokio::test]
async fn test_invalid_line_items_rejected() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    for request in [
        TestDataFactory::line_item("Zero quantity", dec!(0), dec!(1.00)),
        TestDataFactory::line_item("Negative price", dec!(1), dec!(-1.00)),
        TestDataFactory::line_item("Sub-cent price", dec!(1), dec!(0.001)),
        TestDataFactory::line_item("", dec!(1), dec!(1.00)),
    ] {
        let result = service.add_line_item(&invoice.id, request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

#[tokio::test]
async fn test_remove_unknown_line_item_is_not_found() {
    let service = TestDataFactory::service();
    let invoice = TestDataFactory::draft_invoice(&service).await;

    let result = service.remove_line_item(&invoice.id, "missing").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
