// Invoice activity records.
//
// Every committed mutation appends one or more of these. They are never
// updated or deleted and are the only historical record of an invoice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::AppError;
use crate::modules::invoices::models::{InvoiceStatus, LineItem};
use crate::modules::invoices::services::totals::Totals;
use crate::modules::payments::models::Payment;

/// Activity type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    InvoiceCreated,
    LineItemAdded,
    LineItemUpdated,
    LineItemRemoved,
    TaxRateChanged,
    InvoiceSent,
    InvoiceStatusChanged,
    PaymentRecorded,
    PaymentDeleted,
    InvoiceDeleted,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::InvoiceCreated => "INVOICE_CREATED",
            ActivityType::LineItemAdded => "LINE_ITEM_ADDED",
            ActivityType::LineItemUpdated => "LINE_ITEM_UPDATED",
            ActivityType::LineItemRemoved => "LINE_ITEM_REMOVED",
            ActivityType::TaxRateChanged => "TAX_RATE_CHANGED",
            ActivityType::InvoiceSent => "INVOICE_SENT",
            ActivityType::InvoiceStatusChanged => "INVOICE_STATUS_CHANGED",
            ActivityType::PaymentRecorded => "PAYMENT_RECORDED",
            ActivityType::PaymentDeleted => "PAYMENT_DELETED",
            ActivityType::InvoiceDeleted => "INVOICE_DELETED",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INVOICE_CREATED" => Ok(ActivityType::InvoiceCreated),
            "LINE_ITEM_ADDED" => Ok(ActivityType::LineItemAdded),
            "LINE_ITEM_UPDATED" => Ok(ActivityType::LineItemUpdated),
            "LINE_ITEM_REMOVED" => Ok(ActivityType::LineItemRemoved),
            "TAX_RATE_CHANGED" => Ok(ActivityType::TaxRateChanged),
            "INVOICE_SENT" => Ok(ActivityType::InvoiceSent),
            "INVOICE_STATUS_CHANGED" => Ok(ActivityType::InvoiceStatusChanged),
            "PAYMENT_RECORDED" => Ok(ActivityType::PaymentRecorded),
            "PAYMENT_DELETED" => Ok(ActivityType::PaymentDeleted),
            "INVOICE_DELETED" => Ok(ActivityType::InvoiceDeleted),
            _ => Err(AppError::internal(format!("Unknown activity type: {}", s))),
        }
    }
}

/// A state change worth recording, with the data its payload is built from
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    InvoiceCreated {
        contact_id: String,
        booking_id: Option<String>,
        tax_rate: Decimal,
    },
    LineItemAdded {
        line_item: LineItem,
        totals: Totals,
    },
    LineItemUpdated {
        before: LineItem,
        after: LineItem,
        totals: Totals,
    },
    LineItemRemoved {
        line_item: LineItem,
        totals: Totals,
    },
    TaxRateChanged {
        from: Decimal,
        to: Decimal,
        totals: Totals,
    },
    InvoiceSent {
        sent_at: DateTime<Utc>,
        total: Decimal,
    },
    StatusChanged {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    PaymentRecorded {
        payment: Payment,
        totals: Totals,
    },
    PaymentDeleted {
        payment: Payment,
        totals: Totals,
    },
    InvoiceDeleted {
        deleted_at: DateTime<Utc>,
    },
}

impl ActivityEvent {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityEvent::InvoiceCreated { .. } => ActivityType::InvoiceCreated,
            ActivityEvent::LineItemAdded { .. } => ActivityType::LineItemAdded,
            ActivityEvent::LineItemUpdated { .. } => ActivityType::LineItemUpdated,
            ActivityEvent::LineItemRemoved { .. } => ActivityType::LineItemRemoved,
            ActivityEvent::TaxRateChanged { .. } => ActivityType::TaxRateChanged,
            ActivityEvent::InvoiceSent { .. } => ActivityType::InvoiceSent,
            ActivityEvent::StatusChanged { .. } => ActivityType::InvoiceStatusChanged,
            ActivityEvent::PaymentRecorded { .. } => ActivityType::PaymentRecorded,
            ActivityEvent::PaymentDeleted { .. } => ActivityType::PaymentDeleted,
            ActivityEvent::InvoiceDeleted { .. } => ActivityType::InvoiceDeleted,
        }
    }

    /// Variant-specific payload. Decimals are written as strings.
    pub fn payload(&self) -> Value {
        match self {
            ActivityEvent::InvoiceCreated {
                contact_id,
                booking_id,
                tax_rate,
            } => json!({
                "contact_id": contact_id,
                "booking_id": booking_id,
                "tax_rate": tax_rate.to_string(),
            }),
            ActivityEvent::LineItemAdded { line_item, totals } => json!({
                "line_item": line_item_payload(line_item),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::LineItemUpdated {
                before,
                after,
                totals,
            } => json!({
                "line_item_id": after.id,
                "before": line_item_payload(before),
                "after": line_item_payload(after),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::LineItemRemoved { line_item, totals } => json!({
                "line_item": line_item_payload(line_item),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::TaxRateChanged { from, to, totals } => json!({
                "from": from.to_string(),
                "to": to.to_string(),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::InvoiceSent { sent_at, total } => json!({
                "sent_at": sent_at.to_rfc3339(),
                "total": total.to_string(),
            }),
            ActivityEvent::StatusChanged { from, to } => json!({
                "from": from.as_str(),
                "to": to.as_str(),
            }),
            ActivityEvent::PaymentRecorded { payment, totals } => json!({
                "payment": payment_payload(payment),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::PaymentDeleted { payment, totals } => json!({
                "payment": payment_payload(payment),
                "totals": totals_payload(totals),
            }),
            ActivityEvent::InvoiceDeleted { deleted_at } => json!({
                "deleted_at": deleted_at.to_rfc3339(),
            }),
        }
    }
}

fn line_item_payload(line_item: &LineItem) -> Value {
    json!({
        "id": line_item.id,
        "description": line_item.description,
        "quantity": line_item.quantity.to_string(),
        "unit_price": line_item.unit_price.to_string(),
        "total": line_item.total.to_string(),
        "sort_order": line_item.sort_order,
    })
}

fn payment_payload(payment: &Payment) -> Value {
    json!({
        "id": payment.id,
        "amount": payment.amount.to_string(),
        "method": payment.method.as_str(),
        "paid_at": payment.paid_at.to_rfc3339(),
    })
}

fn totals_payload(totals: &Totals) -> Value {
    json!({
        "subtotal": totals.subtotal.to_string(),
        "tax_amount": totals.tax_amount.to_string(),
        "total": totals.total.to_string(),
        "amount_paid": totals.amount_paid.to_string(),
        "amount_due": totals.amount_due.to_string(),
    })
}

/// An activity waiting to be written as part of a commit
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub id: String,
    pub invoice_id: String,
    pub activity_type: ActivityType,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NewActivity {
    pub fn new(invoice_id: &str, event: &ActivityEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            activity_type: event.activity_type(),
            payload: event.payload(),
            created_at,
        }
    }
}

/// A persisted activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceActivity {
    pub id: String,

    pub invoice_id: String,

    /// Store-assigned, strictly increasing; breaks ties between records
    /// written in the same instant
    pub sequence: i64,

    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    pub payload: Value,

    pub created_at: DateTime<Utc>,
}
