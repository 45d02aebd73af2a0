// A line item is one billable row on a draft invoice.
// Its total is quantity × unit_price rounded half-up to currency precision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::money::{self, line_total};
use crate::core::{AppError, Result};

const MAX_DESCRIPTION_LEN: usize = 255;

/// Represents a single line item in an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique identifier for the line item
    pub id: String,

    /// Owning invoice
    pub invoice_id: String,

    /// Description of the product or service
    pub description: String,

    pub quantity: Decimal,

    /// Price per unit
    pub unit_price: Decimal,

    /// quantity × unit_price, rounded per currency
    pub total: Decimal,

    /// Unique ordering key within the invoice
    pub sort_order: i32,

    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Create a new line item with validation
    ///
    /// # Arguments
    /// * `invoice_id` - Owning invoice
    /// * `description` - Product/service description (max 255 chars)
    /// * `quantity` - Must be positive
    /// * `unit_price` - Must be non-negative
    /// * `sort_order` - Position within the invoice
    pub fn new(
        invoice_id: &str,
        description: &str,
        quantity: Decimal,
        unit_price: Decimal,
        sort_order: i32,
    ) -> Result<Self> {
        Self::validate_description(description)?;
        money::validate_quantity(quantity)?;
        money::validate_unit_price(unit_price)?;
        let total = Self::compute_total(quantity, unit_price)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            description: description.trim().to_string(),
            quantity,
            unit_price,
            total,
            sort_order,
            created_at: Utc::now(),
        })
    }

    /// Apply a partial update, revalidating and recomputing the total
    pub fn apply_update(&self, request: &UpdateLineItemRequest) -> Result<Self> {
        let description = request.description.as_deref().unwrap_or(&self.description);
        let quantity = request.quantity.unwrap_or(self.quantity);
        let unit_price = request.unit_price.unwrap_or(self.unit_price);

        Self::validate_description(description)?;
        money::validate_quantity(quantity)?;
        money::validate_unit_price(unit_price)?;
        let total = Self::compute_total(quantity, unit_price)?;

        Ok(Self {
            description: description.trim().to_string(),
            quantity,
            unit_price,
            total,
            sort_order: request.sort_order.unwrap_or(self.sort_order),
            ..self.clone()
        })
    }

    fn compute_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal> {
        let total = line_total(quantity, unit_price)?;
        money::ensure_storable("Line total", total)?;
        Ok(total)
    }

    fn validate_description(description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(AppError::validation(
                "Line item description cannot be empty",
            ));
        }

        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::validation(format!(
                "Line item description cannot exceed {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        Ok(())
    }
}

/// Request to add a line item to a draft invoice
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddLineItemRequest {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Explicit position; defaults to max(existing) + 1
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Partial update of an existing line item
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateLineItemRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl UpdateLineItemRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.sort_order.is_none()
    }
}
