//! Per-(org, year) invoice number allocation (spec.md §4.8, §8 invariant 3).
//! Modeled as an atomic `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! rather than a separate `SELECT ... FOR UPDATE` + `UPDATE` pair — the same
//! single-statement upsert idiom the outbox dedupe key and the session
//! rotation predicate already lean on in this crate.

use chrono::Datelike;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

/// Allocate and return the next invoice number for `org_id` in the current
/// year, formatted `INV-YYYY-NNNNNN`. Must run inside the caller's request
/// transaction so the allocation and the invoice row insert commit or abort
/// together.
pub async fn next_invoice_number(txn: &mut Transaction<'_, Postgres>, org_id: Uuid) -> Result<String, AppError> {
    let year = chrono::Utc::now().year();

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO invoice_sequences (org_id, year, next_value)
         VALUES ($1, $2, 2)
         ON CONFLICT (org_id, year) DO UPDATE SET next_value = invoice_sequences.next_value + 1
         RETURNING next_value - 1",
    )
    .bind(org_id)
    .bind(year)
    .fetch_one(&mut **txn)
    .await?;

    Ok(format!("INV-{year}-{:06}", row.0))
}

#[cfg(test)]
mod tests {
    // The sequence is purely a property of the SQL upsert (no branch to unit
    // test in isolation); monotonicity under concurrency is covered by the
    // `invoice_number_monotonicity` integration scenario.
}
