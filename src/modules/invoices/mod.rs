// Invoices module: the invoice aggregate, its line item ledger and the
// state machine that coordinates every billing mutation

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Invoice, InvoiceStatus, LineItem};
pub use repositories::{InMemoryInvoiceStore, InvoiceStore, MySqlInvoiceStore};
pub use services::InvoiceService;
