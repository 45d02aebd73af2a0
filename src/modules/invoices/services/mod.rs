pub mod invoice_service;
pub mod lifecycle;
pub mod line_item_ledger;
pub mod totals;

pub use invoice_service::InvoiceService;
pub use lifecycle::derive_payment_status;
pub use line_item_ledger::LineItemLedger;
pub use totals::{compute_totals, Billable, Totals};
