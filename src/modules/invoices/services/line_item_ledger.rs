// Line item ledger.
//
// Owns the ordered collection of billable lines for one invoice and refuses
// every mutation unless the invoice is still a draft.

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{
    AddLineItemRequest, Invoice, InvoiceStatus, LineItem, UpdateLineItemRequest,
};

pub struct LineItemLedger {
    invoice_id: String,
    status: InvoiceStatus,
    items: Vec<LineItem>,
}

impl LineItemLedger {
    /// Build the ledger from the freshly loaded line items of `invoice`
    pub fn new(invoice: &Invoice, mut items: Vec<LineItem>) -> Self {
        items.sort_by_key(|item| item.sort_order);

        Self {
            invoice_id: invoice.id.clone(),
            status: invoice.status,
            items,
        }
    }

    /// Line items ordered by sort order
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// max(existing sort orders) + 1, or 0 for an empty invoice
    pub fn next_sort_order(&self) -> Result<i32> {
        match self.items.iter().map(|item| item.sort_order).max() {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or_else(|| {
                AppError::validation(format!(
                    "No sort order left after {}; pass an explicit sort_order",
                    max
                ))
            }),
        }
    }

    /// Append a new line item
    pub fn add(&mut self, request: &AddLineItemRequest) -> Result<LineItem> {
        self.ensure_editable()?;

        let sort_order = match request.sort_order {
            Some(sort_order) => {
                self.ensure_sort_order_free(sort_order, None)?;
                sort_order
            }
            None => self.next_sort_order()?,
        };

        let item = LineItem::new(
            &self.invoice_id,
            &request.description,
            request.quantity,
            request.unit_price,
            sort_order,
        )?;

        self.items.push(item.clone());
        self.items.sort_by_key(|item| item.sort_order);

        Ok(item)
    }

    /// Replace an existing line item, returning `(before, after)`
    pub fn update(
        &mut self,
        line_item_id: &str,
        request: &UpdateLineItemRequest,
    ) -> Result<(LineItem, LineItem)> {
        self.ensure_editable()?;

        let index = self.position(line_item_id)?;
        if let Some(sort_order) = request.sort_order {
            self.ensure_sort_order_free(sort_order, Some(line_item_id))?;
        }

        let before = self.items[index].clone();
        let after = before.apply_update(request)?;

        self.items[index] = after.clone();
        self.items.sort_by_key(|item| item.sort_order);

        Ok((before, after))
    }

    /// Remove a line item, returning what was removed
    pub fn remove(&mut self, line_item_id: &str) -> Result<LineItem> {
        self.ensure_editable()?;

        let index = self.position(line_item_id)?;
        Ok(self.items.remove(index))
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.status != InvoiceStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Line items can only be changed on DRAFT invoices (invoice '{}' is {})",
                self.invoice_id, self.status
            )));
        }

        Ok(())
    }

    fn position(&self, line_item_id: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == line_item_id)
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Line item '{}' not found on invoice '{}'",
                    line_item_id, self.invoice_id
                ))
            })
    }

    fn ensure_sort_order_free(&self, sort_order: i32, except_id: Option<&str>) -> Result<()> {
        let taken = self
            .items
            .iter()
            .any(|item| item.sort_order == sort_order && Some(item.id.as_str()) != except_id);

        if taken {
            return Err(AppError::validation(format!(
                "Sort order {} is already used on this invoice",
                sort_order
            )));
        }

        Ok(())
    }
}
