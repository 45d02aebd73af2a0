// Audit trail writer.
//
// Collects the activity records produced by one logical operation. The
// records are handed to the store together with the state change they
// describe and are written in the same commit, so either all of them land
// or none do. Records of one operation share a single timestamp.

use chrono::{DateTime, Utc};

use crate::modules::activities::models::{ActivityEvent, NewActivity};
use crate::modules::invoices::models::InvoiceStatus;

#[derive(Debug)]
pub struct AuditTrail {
    invoice_id: String,
    recorded_at: DateTime<Utc>,
    entries: Vec<NewActivity>,
}

impl AuditTrail {
    pub fn new(invoice_id: &str) -> Self {
        Self {
            invoice_id: invoice_id.to_string(),
            recorded_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Append a record for `event`
    pub fn append(&mut self, event: ActivityEvent) {
        tracing::debug!(
            invoice_id = %self.invoice_id,
            activity_type = %event.activity_type(),
            "Audit record queued"
        );
        self.entries.push(NewActivity::new(&self.invoice_id, &event, self.recorded_at));
    }

    /// Append a status change record when, and only when, the status moved.
    ///
    /// Returns whether a record was appended.
    pub fn status_transition(&mut self, from: InvoiceStatus, to: InvoiceStatus) -> bool {
        if from == to {
            return false;
        }

        self.append(ActivityEvent::StatusChanged { from, to });
        true
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<NewActivity> {
        self.entries
    }
}
