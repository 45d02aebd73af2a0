pub mod invoice_store;
pub mod memory_store;
pub mod mysql_store;

pub use invoice_store::{InvoiceChangeSet, InvoiceStore, LedgerChange};
pub use memory_store::InMemoryInvoiceStore;
pub use mysql_store::MySqlInvoiceStore;
