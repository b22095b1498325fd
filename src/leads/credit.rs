//! Referral credit lifecycle (spec.md §4.9, §3). A credit is created
//! PENDING at lead intake and resolved only when the *referred* lead's own
//! booking reaches a terminal outcome — granted on CONFIRMED, voided on
//! CANCELLED. Both resolutions are plain UPDATEs against the caller's
//! transaction so they commit atomically with the booking transition that
//! triggered them (spec.md §4.9: "Credit grant and booking confirmation
//! commit together").

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditState {
    Pending,
    Granted,
    Voided,
}

/// Default referral credit amount in cents. The spec leaves the amount
/// unspecified beyond "a referral credit"; a fixed flat amount keeps the
/// pipeline's behavior deterministic without inventing a pricing rule this
/// repository doesn't otherwise own.
pub const DEFAULT_CREDIT_AMOUNT_CENTS: i64 = 2500;

/// Create a PENDING credit for `beneficiary_lead_id` (the referrer) sourced
/// from `source_lead_id` (the new, referred lead). No-op if `referred_by`
/// was absent — callers only invoke this when a referrer was supplied.
pub async fn create_pending(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    beneficiary_lead_id: Uuid,
    source_lead_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO referral_credits (id, org_id, beneficiary_lead_id, source_lead_id, amount_cents, state, created_at)
         VALUES ($1, $2, $3, $4, $5, 'PENDING', now())",
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(beneficiary_lead_id)
    .bind(source_lead_id)
    .bind(DEFAULT_CREDIT_AMOUNT_CENTS)
    .execute(&mut **txn)
    .await?;
    Ok(())
}

/// Grant any PENDING credit sourced from `source_lead_id` — called when
/// that lead's booking transitions to CONFIRMED.
pub async fn resolve_on_confirm(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, source_lead_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE referral_credits SET state = 'GRANTED'
         WHERE org_id = $1 AND source_lead_id = $2 AND state = 'PENDING'",
    )
    .bind(org_id)
    .bind(source_lead_id)
    .execute(&mut **txn)
    .await?;
    Ok(())
}

/// Void any PENDING credit sourced from `source_lead_id` — called when
/// that lead's booking transitions to CANCELLED.
pub async fn resolve_on_cancel(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, source_lead_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE referral_credits SET state = 'VOIDED'
         WHERE org_id = $1 AND source_lead_id = $2 AND state = 'PENDING'",
    )
    .bind(org_id)
    .bind(source_lead_id)
    .execute(&mut **txn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_amount_is_positive() {
        assert!(DEFAULT_CREDIT_AMOUNT_CENTS > 0);
    }
}
