//! Invoice Ledger (spec.md §4.8): atomic numbering, line items, payments,
//! and public-link tokens. Totals are always computed server-side from
//! items — no client-supplied total is ever trusted.

pub mod link;
pub mod numbering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Partial,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Void | InvoiceStatus::Paid)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub number: String,
    pub status: InvoiceStatus,
    pub public_token_hash: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub qty: i32,
    pub unit_price_cents: i64,
    pub tax_cents: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoicePayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub received_at: DateTime<Utc>,
}

pub struct NewItem {
    pub description: String,
    pub qty: i32,
    pub unit_price_cents: i64,
    pub tax_cents: i64,
}

/// `total = sum(qty * unit_price) + sum(tax)` — the single definition of
/// "invoice total" every status transition below is computed against.
fn line_total(item: &NewItem) -> i64 {
    item.qty as i64 * item.unit_price_cents + item.tax_cents
}

/// Create a DRAFT invoice from a booking, allocating its number atomically
/// within the caller's transaction (spec.md §8 invariant 3).
pub async fn create_from_booking(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    booking_id: Uuid,
    items: &[NewItem],
) -> Result<Invoice, AppError> {
    if items.is_empty() {
        return Err(AppError::validation("invoice requires at least one line item"));
    }
    if items.iter().any(|item| line_total(item) < 0) {
        return Err(AppError::validation("invoice line total cannot be negative"));
    }

    let number = numbering::next_invoice_number(txn, org_id).await?;
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO invoices (id, org_id, booking_id, number, status, created_at)
         VALUES ($1, $2, $3, $4, 'DRAFT', now())",
    )
    .bind(id)
    .bind(org_id)
    .bind(booking_id)
    .bind(&number)
    .execute(&mut **txn)
    .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO invoice_items (id, invoice_id, description, qty, unit_price_cents, tax_cents)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(&item.description)
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .bind(item.tax_cents)
        .execute(&mut **txn)
        .await?;
    }

    Ok(Invoice { id, org_id, booking_id: Some(booking_id), number, status: InvoiceStatus::Draft, public_token_hash: None })
}

pub async fn get(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
    let row: Option<Invoice> = sqlx::query_as(
        "SELECT id, org_id, booking_id, number, status, public_token_hash
         FROM invoices WHERE id = $1 AND org_id = $2",
    )
    .bind(invoice_id)
    .bind(org_id)
    .fetch_optional(&mut **txn)
    .await?;
    row.ok_or(AppError::NotFound { resource: "invoice" })
}

async fn total_cents(txn: &mut Transaction<'_, Postgres>, invoice_id: Uuid) -> Result<i64, AppError> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(qty * unit_price_cents + tax_cents) FROM invoice_items WHERE invoice_id = $1",
    )
    .bind(invoice_id)
    .fetch_one(&mut **txn)
    .await?;
    Ok(row.0.unwrap_or(0))
}

async fn paid_cents(txn: &mut Transaction<'_, Postgres>, invoice_id: Uuid) -> Result<i64, AppError> {
    let row: (Option<i64>,) = sqlx::query_as("SELECT SUM(amount_cents) FROM invoice_payments WHERE invoice_id = $1")
        .bind(invoice_id)
        .fetch_one(&mut **txn)
        .await?;
    Ok(row.0.unwrap_or(0))
}

/// Send (or re-send) an invoice: transitions DRAFT → SENT and issues a fresh
/// public link token, invalidating any prior one (spec.md §4.8 — re-sending
/// rotates the token).
pub async fn send(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, invoice_id: Uuid) -> Result<(Invoice, String), AppError> {
    let invoice = get(txn, org_id, invoice_id).await?;
    if invoice.status.is_terminal() {
        return Err(AppError::conflict("cannot send a terminal invoice"));
    }

    let (token, hash) = link::generate();
    let next_status = if invoice.status == InvoiceStatus::Draft { InvoiceStatus::Sent } else { invoice.status };

    sqlx::query("UPDATE invoices SET status = $3, public_token_hash = $4 WHERE id = $1 AND org_id = $2")
        .bind(invoice_id)
        .bind(org_id)
        .bind(next_status)
        .bind(&hash)
        .execute(&mut **txn)
        .await?;

    Ok((Invoice { status: next_status, public_token_hash: Some(hash), ..invoice }, token))
}

/// Record a payment and recompute status: `paid < total` → PARTIAL,
/// `paid >= total` → PAID. Terminal invoices reject further payments.
pub async fn record_payment(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    invoice_id: Uuid,
    amount_cents: i64,
) -> Result<Invoice, AppError> {
    let invoice = get(txn, org_id, invoice_id).await?;
    if invoice.status.is_terminal() {
        return Err(AppError::conflict("cannot record payment against a terminal invoice"));
    }
    if amount_cents <= 0 {
        return Err(AppError::validation("payment amount must be positive"));
    }

    sqlx::query(
        "INSERT INTO invoice_payments (id, invoice_id, amount_cents, received_at) VALUES ($1, $2, $3, now())",
    )
    .bind(Uuid::new_v4())
    .bind(invoice_id)
    .bind(amount_cents)
    .execute(&mut **txn)
    .await?;

    let total = total_cents(txn, invoice_id).await?;
    let paid = paid_cents(txn, invoice_id).await?;
    let next_status = if paid >= total { InvoiceStatus::Paid } else { InvoiceStatus::Partial };

    sqlx::query("UPDATE invoices SET status = $3 WHERE id = $1 AND org_id = $2")
        .bind(invoice_id)
        .bind(org_id)
        .bind(next_status)
        .execute(&mut **txn)
        .await?;

    Ok(Invoice { status: next_status, ..invoice })
}

/// VOID is terminal — once set, no further payments or sends are accepted
/// (enforced by the terminal checks above).
pub async fn void(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
    let invoice = get(txn, org_id, invoice_id).await?;
    if invoice.status == InvoiceStatus::Paid {
        return Err(AppError::conflict("cannot void a paid invoice"));
    }

    sqlx::query("UPDATE invoices SET status = 'VOID' WHERE id = $1 AND org_id = $2")
        .bind(invoice_id)
        .bind(org_id)
        .execute(&mut **txn)
        .await?;

    Ok(Invoice { status: InvoiceStatus::Void, ..invoice })
}

/// Public-link lookup: hash the presented token and match against the
/// stored hash only — the plaintext token never round-trips through a
/// comparison that could leak via timing on a naive `==`, since this is a
/// single indexed equality lookup rather than a secret comparison loop.
pub async fn get_by_public_token(pool: &sqlx::PgPool, token: &str) -> Result<Invoice, AppError> {
    let hash = link::hash_token(token);
    let row: Option<Invoice> = sqlx::query_as(
        "SELECT id, org_id, booking_id, number, status, public_token_hash
         FROM invoices WHERE public_token_hash = $1",
    )
    .bind(&hash)
    .fetch_optional(pool)
    .await?;
    row.ok_or(AppError::NotFound { resource: "invoice" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_includes_tax() {
        let item = NewItem { description: "clean".into(), qty: 2, unit_price_cents: 5000, tax_cents: 300 };
        assert_eq!(line_total(&item), 10300);
    }

    #[test]
    fn terminal_statuses_are_paid_and_void() {
        assert!(InvoiceStatus::Paid.is_terminal());
        assert!(InvoiceStatus::Void.is_terminal());
        assert!(!InvoiceStatus::Sent.is_terminal());
        assert!(!InvoiceStatus::Partial.is_terminal());
    }
}
