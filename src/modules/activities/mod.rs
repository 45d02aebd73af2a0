// Activities module: the append-only audit trail of every invoice

pub mod controllers;
pub mod models;
pub mod services;

pub use models::{ActivityEvent, ActivityType, InvoiceActivity, NewActivity};
pub use services::AuditTrail;
