mod invoice;
mod line_item;

pub use invoice::{
    CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceStatus, MutationOutcome,
    SetStatusRequest, UpdateTaxRateRequest,
};
pub use line_item::{AddLineItemRequest, LineItem, UpdateLineItemRequest};
