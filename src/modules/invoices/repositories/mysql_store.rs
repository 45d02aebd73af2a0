// MySQL record store.
//
// Every commit runs in one database transaction:
// 1. Conditional invoice update (WHERE version = expected)
// 2. Ledger change (line item / payment rows)
// 3. Activity inserts
// 4. Commit
//
// A zero-row invoice update means the version moved or the invoice is gone,
// and the whole transaction is rolled back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use super::invoice_store::{InvoiceChangeSet, InvoiceStore, LedgerChange};
use crate::core::{AppError, Result};
use crate::modules::activities::models::{InvoiceActivity, NewActivity};
use crate::modules::invoices::models::{Invoice, LineItem};
use crate::modules::payments::models::Payment;

const INVOICE_COLUMNS: &str = r#"
    id, contact_id, booking_id, status, subtotal, tax_rate, tax_amount, total,
    amount_paid, amount_due, due_date, notes, sent_at, deleted_at, version,
    created_at, updated_at
"#;

/// Store backed by a MySQL connection pool
pub struct MySqlInvoiceStore {
    pool: MySqlPool,
}

impl MySqlInvoiceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Apply embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_activity(
        tx: &mut Transaction<'_, MySql>,
        activity: &NewActivity,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoice_activities (id, invoice_id, activity_type, payload, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.id)
        .bind(&activity.invoice_id)
        .bind(activity.activity_type.as_str())
        .bind(&activity.payload)
        .bind(activity.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to append activity: {}", e)))?;

        Ok(())
    }

    async fn apply_change(
        tx: &mut Transaction<'_, MySql>,
        invoice_id: &str,
        change: &LedgerChange,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match change {
            LedgerChange::InsertLineItem(item) => {
                sqlx::query(
                    r#"
                    INSERT INTO line_items (
                        id, invoice_id, description, quantity, unit_price, total,
                        sort_order, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&item.id)
                .bind(invoice_id)
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.total)
                .bind(item.sort_order)
                .bind(item.created_at)
                .execute(&mut **tx)
                .await
                .map_err(map_write_error("create line item"))?;
            }
            LedgerChange::UpdateLineItem(item) => {
                // MySQL reports changed rows, not matched rows, so an update that
                // rewrites identical values affects zero rows. Existence is
                // guaranteed by the version check on the invoice row.
                sqlx::query(
                    r#"
                    UPDATE line_items
                    SET description = ?, quantity = ?, unit_price = ?, total = ?, sort_order = ?
                    WHERE id = ? AND invoice_id = ?
                    "#,
                )
                .bind(&item.description)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.total)
                .bind(item.sort_order)
                .bind(&item.id)
                .bind(invoice_id)
                .execute(&mut **tx)
                .await
                .map_err(map_write_error("update line item"))?;
            }
            LedgerChange::DeleteLineItem { line_item_id } => {
                let result = sqlx::query("DELETE FROM line_items WHERE id = ? AND invoice_id = ?")
                    .bind(line_item_id)
                    .bind(invoice_id)
                    .execute(&mut **tx)
                    .await
                    .map_err(map_write_error("delete line item"))?;

                ensure_found(result.rows_affected(), "Line item", line_item_id)?;
            }
            LedgerChange::InsertPayment(payment) => {
                sqlx::query(
                    r#"
                    INSERT INTO payments (id, invoice_id, amount, method, paid_at, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&payment.id)
                .bind(invoice_id)
                .bind(payment.amount)
                .bind(payment.method.as_str())
                .bind(payment.paid_at)
                .bind(payment.created_at)
                .execute(&mut **tx)
                .await
                .map_err(map_write_error("create payment"))?;
            }
            LedgerChange::DeletePayment { payment_id } => {
                let result = sqlx::query(
                    r#"
                    UPDATE payments
                    SET deleted_at = ?
                    WHERE id = ? AND invoice_id = ? AND deleted_at IS NULL
                    "#,
                )
                .bind(now)
                .bind(payment_id)
                .bind(invoice_id)
                .execute(&mut **tx)
                .await
                .map_err(map_write_error("delete payment"))?;

                ensure_found(result.rows_affected(), "Payment", payment_id)?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for MySqlInvoiceStore {
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        activities: &[NewActivity],
    ) -> Result<Invoice> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, contact_id, booking_id, status, subtotal, tax_rate, tax_amount, total,
                amount_paid, amount_due, due_date, notes, sent_at, deleted_at, version,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.contact_id)
        .bind(&invoice.booking_id)
        .bind(invoice.status.as_str())
        .bind(invoice.subtotal)
        .bind(invoice.tax_rate)
        .bind(invoice.tax_amount)
        .bind(invoice.total)
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.sent_at)
        .bind(invoice.deleted_at)
        .bind(invoice.version)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error("create invoice"))?;

        for activity in activities {
            Self::insert_activity(&mut tx, activity).await?;
        }

        tx.commit().await?;

        Ok(invoice.clone())
    }

    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = ? AND deleted_at IS NULL",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch invoice: {}", e)))?;

        row.map(Invoice::try_from).transpose()
    }

    async fn list_line_items(&self, invoice_id: &str) -> Result<Vec<LineItem>> {
        let rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT id, invoice_id, description, quantity, unit_price, total, sort_order, created_at
            FROM line_items
            WHERE invoice_id = ?
            ORDER BY sort_order
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch line items: {}", e)))?;

        Ok(rows.into_iter().map(LineItem::from).collect())
    }

    async fn list_payments(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, invoice_id, amount, method, paid_at, created_at
            FROM payments
            WHERE invoice_id = ? AND deleted_at IS NULL
            ORDER BY paid_at, created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payments: {}", e)))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn list_activities(&self, invoice_id: &str) -> Result<Vec<InvoiceActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT seq, id, invoice_id, activity_type, payload, created_at
            FROM invoice_activities
            WHERE invoice_id = ?
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch activities: {}", e)))?;

        rows.into_iter().map(InvoiceActivity::try_from).collect()
    }

    async fn commit(&self, changeset: InvoiceChangeSet) -> Result<Invoice> {
        let now = Utc::now();
        let invoice = &changeset.invoice;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = ?, subtotal = ?, tax_rate = ?, tax_amount = ?, total = ?,
                amount_paid = ?, amount_due = ?, due_date = ?, notes = ?, sent_at = ?,
                deleted_at = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ? AND deleted_at IS NULL
            "#,
        )
        .bind(invoice.status.as_str())
        .bind(invoice.subtotal)
        .bind(invoice.tax_rate)
        .bind(invoice.tax_amount)
        .bind(invoice.total)
        .bind(invoice.amount_paid)
        .bind(invoice.amount_due)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.sent_at)
        .bind(invoice.deleted_at)
        .bind(now)
        .bind(&invoice.id)
        .bind(changeset.expected_version())
        .execute(&mut *tx)
        .await
        .map_err(map_write_error("update invoice"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;

            return match self.find_invoice(&invoice.id).await? {
                Some(current) => Err(AppError::conflict(format!(
                    "Invoice '{}' was modified concurrently (expected version {}, found {})",
                    invoice.id,
                    changeset.expected_version(),
                    current.version
                ))),
                None => Err(AppError::not_found(format!(
                    "Invoice '{}' not found",
                    invoice.id
                ))),
            };
        }

        for change in &changeset.ledger {
            Self::apply_change(&mut tx, &invoice.id, change, now).await?;
        }

        for activity in &changeset.activities {
            Self::insert_activity(&mut tx, activity).await?;
        }

        tx.commit().await?;

        let mut committed = changeset.invoice;
        committed.version += 1;
        committed.updated_at = now;

        Ok(committed)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mysql"
    }
}

fn ensure_found(rows_affected: u64, entity: &str, id: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(AppError::not_found(format!("{} '{}' not found", entity, id)));
    }
    Ok(())
}

/// Unique violations mean another writer got there first
fn map_write_error(action: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::conflict(format!("Failed to {}: {}", action, db_err));
            }
        }
        AppError::Internal(format!("Failed to {}: {}", action, e))
    }
}

// Helper structs for database mapping

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: String,
    contact_id: String,
    booking_id: Option<String>,
    status: String,
    subtotal: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    total: Decimal,
    amount_paid: Decimal,
    amount_due: Decimal,
    due_date: Option<NaiveDate>,
    notes: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid status in database: {}", e)))?;

        Ok(Invoice {
            id: row.id,
            contact_id: row.contact_id,
            booking_id: row.booking_id,
            status,
            subtotal: row.subtotal,
            tax_rate: row.tax_rate,
            tax_amount: row.tax_amount,
            total: row.total,
            amount_paid: row.amount_paid,
            amount_due: row.amount_due,
            due_date: row.due_date,
            notes: row.notes,
            sent_at: row.sent_at,
            deleted_at: row.deleted_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    id: String,
    invoice_id: String,
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
    total: Decimal,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        LineItem {
            id: row.id,
            invoice_id: row.invoice_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total: row.total,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    invoice_id: String,
    amount: Decimal,
    method: String,
    paid_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let method = row
            .method
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid payment method in database: {}", e)))?;

        Ok(Payment {
            id: row.id,
            invoice_id: row.invoice_id,
            amount: row.amount,
            method,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActivityRow {
    seq: i64,
    id: String,
    invoice_id: String,
    activity_type: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for InvoiceActivity {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self> {
        Ok(InvoiceActivity {
            id: row.id,
            invoice_id: row.invoice_id,
            sequence: row.seq,
            activity_type: row.activity_type.parse()?,
            payload: row.payload,
            created_at: row.created_at,
        })
    }
}
