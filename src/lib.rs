//! Invoice billing and audit engine
//!
//! Draft invoices are built from line items, sent, and settled by payments.
//! Every mutation recomputes totals with exact decimal arithmetic and commits
//! the change together with its audit records.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::activities;
pub use modules::invoices;
pub use modules::payments;
