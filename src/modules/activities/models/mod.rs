mod activity;

pub use activity::{ActivityEvent, ActivityType, InvoiceActivity, NewActivity};
