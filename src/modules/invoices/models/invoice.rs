// Invoice aggregate root.
//
// An invoice is a financial document billed to a contact. Its monetary fields
// are always derived from the line item and payment ledgers by the totals
// engine; nothing outside the state machine writes them directly.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::LineItem;
use crate::core::money::{self, round_currency};
use crate::core::{AppError, Result};
use crate::modules::invoices::services::totals::Totals;
use crate::modules::payments::models::Payment;

/// Invoice status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Editable; line items may be added, changed or removed
    Draft,

    /// Locked and awaiting payment
    Sent,

    /// At least one payment recorded, balance still outstanding
    PartiallyPaid,

    /// Balance settled (or overpaid)
    Paid,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PARTIALLY_PAID" => Ok(InvoiceStatus::PartiallyPaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            _ => Err(AppError::validation(format!("Invalid invoice status: {}", s))),
        }
    }
}

/// Represents an invoice billed to a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique invoice ID (UUID)
    pub id: String,

    /// Contact the invoice is billed to
    pub contact_id: String,

    /// Booking the invoice originated from, if any
    pub booking_id: Option<String>,

    pub status: InvoiceStatus,

    /// Sum of rounded line totals
    pub subtotal: Decimal,

    /// Fractional tax rate applied to the subtotal (0.1 = 10%)
    pub tax_rate: Decimal,

    pub tax_amount: Decimal,

    /// subtotal + tax_amount
    pub total: Decimal,

    /// Sum of all non-deleted payments
    pub amount_paid: Decimal,

    /// total - amount_paid; negative when overpaid
    pub amount_due: Decimal,

    pub due_date: Option<NaiveDate>,

    pub notes: Option<String>,

    /// When the invoice left DRAFT
    pub sent_at: Option<DateTime<Utc>>,

    /// Soft-delete marker; deleted invoices are excluded from every read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency token, bumped by every committed mutation
    pub version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a new DRAFT invoice with zeroed totals
    pub fn new_draft(request: &CreateInvoiceRequest, tax_rate: Decimal) -> Result<Self> {
        request.validate()?;
        money::validate_tax_rate(tax_rate)?;

        let now = Utc::now();
        let zero = round_currency(Decimal::ZERO);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            contact_id: request.contact_id.trim().to_string(),
            booking_id: request.booking_id.clone(),
            status: InvoiceStatus::Draft,
            subtotal: zero,
            tax_rate,
            tax_amount: zero,
            total: zero,
            amount_paid: zero,
            amount_due: zero,
            due_date: request.due_date,
            notes: request.notes.clone(),
            sent_at: None,
            deleted_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Line items may only change while the invoice is a draft
    pub fn is_editable(&self) -> bool {
        self.status == InvoiceStatus::Draft
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Overpayment shows up as a negative balance
    pub fn is_overpaid(&self) -> bool {
        self.amount_due < Decimal::ZERO
    }

    /// Copy freshly computed totals onto the invoice
    pub fn apply_totals(&mut self, totals: &Totals) {
        self.subtotal = totals.subtotal;
        self.tax_amount = totals.tax_amount;
        self.total = totals.total;
        self.amount_paid = totals.amount_paid;
        self.amount_due = totals.amount_due;
    }
}

/// Request to create a draft invoice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateInvoiceRequest {
    pub contact_id: String,

    #[serde(default)]
    pub booking_id: Option<String>,

    /// Falls back to the configured default tax rate when absent
    #[serde(default)]
    pub tax_rate: Option<Decimal>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn validate(&self) -> Result<()> {
        if self.contact_id.trim().is_empty() {
            return Err(AppError::validation("Contact ID cannot be empty"));
        }

        if self.contact_id.len() > 64 {
            return Err(AppError::validation("Contact ID cannot exceed 64 characters"));
        }

        if let Some(booking_id) = &self.booking_id {
            if booking_id.trim().is_empty() {
                return Err(AppError::validation("Booking ID cannot be blank"));
            }
        }

        if let Some(notes) = &self.notes {
            if notes.len() > 2000 {
                return Err(AppError::validation("Notes cannot exceed 2000 characters"));
            }
        }

        Ok(())
    }
}

/// Request to change the tax rate on a draft invoice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateTaxRateRequest {
    pub tax_rate: Decimal,
}

/// Operator override of the invoice status
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetStatusRequest {
    pub status: InvoiceStatus,
}

/// Invoice together with its ledgers, as returned by reads
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub line_items: Vec<LineItem>,
    pub payments: Vec<Payment>,
}

/// Result of a state machine operation
///
/// Carries the updated invoice, the entity the operation created or touched,
/// and the status pair so callers can react to transitions without
/// re-deriving them.
#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome<T = ()> {
    pub invoice: Invoice,
    pub entity: T,
    pub previous_status: InvoiceStatus,
    pub status: InvoiceStatus,
}

impl<T> MutationOutcome<T> {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.status
    }
}
