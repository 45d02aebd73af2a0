// Test Assertion Helpers

use billing_engine::activities::{ActivityType, InvoiceActivity};
use billing_engine::invoices::models::Invoice;
use billing_engine::invoices::InvoiceService;
use rust_decimal::Decimal;
use serde_json::Value;

/// Assert the reconciliation identities hold on a stored invoice
pub fn assert_reconciled(invoice: &Invoice) {
    assert_eq!(
        invoice.total,
        invoice.subtotal + invoice.tax_amount,
        "total must equal subtotal + tax_amount"
    );
    assert_eq!(
        invoice.amount_due,
        invoice.total - invoice.amount_paid,
        "amount_due must equal total - amount_paid"
    );
}

/// Assert amount_paid equals the sum of the invoice's live payments
pub async fn assert_paid_matches_ledger(service: &InvoiceService, invoice_id: &str) {
    let detail = service.get_invoice(invoice_id).await.unwrap();
    let sum: Decimal = detail.payments.iter().map(|payment| payment.amount).sum();

    assert_eq!(detail.invoice.amount_paid, sum);
    assert_reconciled(&detail.invoice);
}

/// Activities of one type, newest first
pub fn activities_of(activities: &[InvoiceActivity], activity_type: ActivityType) -> Vec<&InvoiceActivity> {
    activities
        .iter()
        .filter(|activity| activity.activity_type == activity_type)
        .collect()
}

/// Assert a JSON field equals the expected value
pub fn assert_json_field_eq(json: &Value, field: &str, expected: &Value) {
    assert_eq!(
        json.get(field),
        Some(expected),
        "Field '{}' mismatch in {}",
        field,
        json
    );
}

/// Assert a JSON error body carries the expected code
pub fn assert_error_code(json: &Value, code: u16) {
    assert_eq!(json["error"]["code"], code, "Unexpected error body: {}", json);
    assert!(json["error"]["message"].is_string());
}
