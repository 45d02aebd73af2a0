// Payments module

pub mod controllers;
pub mod models;
pub mod services;

pub use models::{Payment, PaymentMethod, RecordPaymentRequest};
pub use services::PaymentLedger;
