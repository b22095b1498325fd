//! Lead/Referral Pipeline (spec.md §4.9): public intake, referral code
//! issuance, and the credit lifecycle wired to booking confirmation.

pub mod credit;
pub mod referral_code;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Booked,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub org_id: Uuid,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,
    pub estimate_snapshot: Value,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub status: LeadStatus,
}

pub struct NewLead {
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,
    pub estimate_snapshot: Value,
    pub referred_by_code: Option<String>,
}

/// Structural validity only — the estimate snapshot is opaque to this
/// system (produced by the pricing evaluator out of scope here). "Valid"
/// means a non-null JSON object; anything else cannot later be displayed
/// or replayed meaningfully.
fn validate_estimate_snapshot(snapshot: &Value) -> Result<(), AppError> {
    if !snapshot.is_object() || snapshot.as_object().map(|o| o.is_empty()).unwrap_or(true) {
        return Err(AppError::validation("estimate snapshot must be a non-empty object"));
    }
    Ok(())
}

const MAX_CODE_ATTEMPTS: u32 = 5;

/// Public lead intake. Validates the estimate snapshot, resolves
/// `referred_by_code` to a lead in the same org (if supplied), issues a
/// unique referral code for the new lead, and — if a referrer was found —
/// opens a PENDING referral credit sourced from this new lead.
pub async fn intake(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, input: NewLead) -> Result<Lead, AppError> {
    validate_estimate_snapshot(&input.estimate_snapshot)?;

    let referred_by = match &input.referred_by_code {
        Some(code) => Some(find_by_referral_code(txn, org_id, code).await?.id),
        None => None,
    };

    let id = Uuid::new_v4();
    let mut code = referral_code::generate();
    let mut attempts = 0;
    loop {
        let result = sqlx::query(
            "INSERT INTO leads (id, org_id, contact_name, contact_phone, contact_email, contact_address,
                                 estimate_snapshot, referral_code, referred_by, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'NEW', now())",
        )
        .bind(id)
        .bind(org_id)
        .bind(&input.contact_name)
        .bind(&input.contact_phone)
        .bind(&input.contact_email)
        .bind(&input.contact_address)
        .bind(&input.estimate_snapshot)
        .bind(&code)
        .bind(referred_by)
        .execute(&mut **txn)
        .await;

        match result {
            Ok(_) => break,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() && attempts < MAX_CODE_ATTEMPTS => {
                attempts += 1;
                code = referral_code::generate();
                continue;
            }
            Err(other) => return Err(other.into()),
        }
    }

    if let Some(beneficiary) = referred_by {
        credit::create_pending(txn, org_id, beneficiary, id).await?;
    }

    Ok(Lead {
        id,
        org_id,
        contact_name: input.contact_name,
        contact_phone: input.contact_phone,
        contact_email: input.contact_email,
        contact_address: input.contact_address,
        estimate_snapshot: input.estimate_snapshot,
        referral_code: code,
        referred_by,
        status: LeadStatus::New,
    })
}

async fn find_by_referral_code(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, code: &str) -> Result<Lead, AppError> {
    let normalized = referral_code::normalize(code);
    let row: Option<Lead> = sqlx::query_as(
        "SELECT id, org_id, contact_name, contact_phone, contact_email, contact_address,
                estimate_snapshot, referral_code, referred_by, status
         FROM leads WHERE org_id = $1 AND referral_code = $2",
    )
    .bind(org_id)
    .bind(&normalized)
    .fetch_optional(&mut **txn)
    .await?;
    row.ok_or(AppError::validation("referred_by code does not match a lead in this org"))
}

pub async fn get(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, lead_id: Uuid) -> Result<Lead, AppError> {
    let row: Option<Lead> = sqlx::query_as(
        "SELECT id, org_id, contact_name, contact_phone, contact_email, contact_address,
                estimate_snapshot, referral_code, referred_by, status
         FROM leads WHERE id = $1 AND org_id = $2",
    )
    .bind(lead_id)
    .bind(org_id)
    .fetch_optional(&mut **txn)
    .await?;
    row.ok_or(AppError::NotFound { resource: "lead" })
}

pub async fn set_status(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, lead_id: Uuid, status: LeadStatus) -> Result<(), AppError> {
    sqlx::query("UPDATE leads SET status = $3 WHERE id = $1 AND org_id = $2")
        .bind(lead_id)
        .bind(org_id)
        .bind(status)
        .execute(&mut **txn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_snapshot_is_rejected() {
        assert!(validate_estimate_snapshot(&serde_json::json!({})).is_err());
    }

    #[test]
    fn array_snapshot_is_rejected() {
        assert!(validate_estimate_snapshot(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn populated_object_snapshot_is_accepted() {
        assert!(validate_estimate_snapshot(&serde_json::json!({"sqft": 1200, "rooms": 3})).is_ok());
    }
}
