use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::money::{self, round_currency};
use crate::core::{AppError, Result};

/// How a payment was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            "OTHER" => Ok(PaymentMethod::Other),
            _ => Err(AppError::validation(format!("Invalid payment method: {}", s))),
        }
    }
}

/// A settlement recorded against an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment ID (UUID)
    pub id: String,

    /// Owning invoice
    pub invoice_id: String,

    /// Always positive, currency precision
    pub amount: Decimal,

    pub method: PaymentMethod,

    /// When the money was received
    pub paid_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new payment
    ///
    /// # Arguments
    /// * `invoice_id` - Invoice the payment settles
    /// * `amount` - Must be positive with at most two decimal places
    /// * `method` - Settlement method
    /// * `paid_at` - Defaults to now when absent
    pub fn new(
        invoice_id: &str,
        amount: Decimal,
        method: PaymentMethod,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        money::validate_payment_amount(amount)?;

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            amount: round_currency(amount),
            method,
            paid_at: paid_at.unwrap_or(now),
            created_at: now,
        })
    }
}

/// Request to record a payment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}
