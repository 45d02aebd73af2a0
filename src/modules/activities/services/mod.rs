pub mod audit_trail;

pub use audit_trail::AuditTrail;
