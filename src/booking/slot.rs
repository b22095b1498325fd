//! Slot exclusivity (spec.md §4.7 invariant, §8 invariant 2): no two
//! non-cancelled bookings on the same team may have overlapping
//! `[starts_at, starts_at+duration)` intervals. `lock_team` takes a
//! row-level lock on the team so concurrent create/reschedule attempts for
//! the same team serialize; `overlaps` is then a safe read under that lock.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;

/// Lock the team row for the duration of the caller's transaction. Every
/// booking create/reschedule against this team must take this lock before
/// checking for an overlap, so the check-then-insert is atomic.
pub async fn lock_team(txn: &mut Transaction<'_, Postgres>, org_id: Uuid, team_id: Uuid) -> Result<(), AppError> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM teams WHERE id = $1 AND org_id = $2 FOR UPDATE")
        .bind(team_id)
        .bind(org_id)
        .fetch_optional(&mut **txn)
        .await?;
    row.ok_or(AppError::NotFound { resource: "team" })?;
    Ok(())
}

/// `true` if `[starts_at, starts_at+duration)` intersects any non-cancelled,
/// non-expired booking on `team_id` other than `exclude_booking_id`
/// (reschedule excludes the booking being moved). Caller must hold
/// [`lock_team`] first.
pub async fn overlaps(
    txn: &mut Transaction<'_, Postgres>,
    org_id: Uuid,
    team_id: Uuid,
    starts_at: DateTime<Utc>,
    duration_min: i32,
    exclude_booking_id: Option<Uuid>,
) -> Result<bool, AppError> {
    let ends_at = starts_at + Duration::minutes(duration_min as i64);

    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM bookings
            WHERE org_id = $1 AND team_id = $2
              AND status NOT IN ('CANCELLED', 'EXPIRED')
              AND ($5::uuid IS NULL OR id != $5)
              AND starts_at < $4
              AND (starts_at + make_interval(mins => duration_min)) > $3
         )",
    )
    .bind(org_id)
    .bind(team_id)
    .bind(starts_at)
    .bind(ends_at)
    .bind(exclude_booking_id)
    .fetch_one(&mut **txn)
    .await?;
    Ok(row.0)
}

/// Pure interval-overlap predicate, factored out so [`overlaps`]'s SQL and
/// the in-memory property test below share one definition of "overlap".
pub fn intervals_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_intervals_overlap() {
        assert!(intervals_overlap(0, 60, 0, 60));
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        assert!(!intervals_overlap(0, 60, 60, 120));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap() {
        assert!(!intervals_overlap(0, 30, 100, 130));
    }

    proptest! {
        /// Invariant 2 (§8), expressed over the pure predicate: overlap is
        /// symmetric — if A overlaps B then B overlaps A.
        #[test]
        fn overlap_is_symmetric(a_start in 0i64..1000, a_len in 1i64..200, b_start in 0i64..1000, b_len in 1i64..200) {
            let a_end = a_start + a_len;
            let b_end = b_start + b_len;
            prop_assert_eq!(
                intervals_overlap(a_start, a_end, b_start, b_end),
                intervals_overlap(b_start, b_end, a_start, a_end),
            );
        }

        /// A booking never overlaps itself's complement: shrinking either
        /// interval to zero length removes any overlap.
        #[test]
        fn zero_length_interval_never_overlaps(a_start in 0i64..1000, b_start in 0i64..1000, b_len in 1i64..200) {
            prop_assert!(!intervals_overlap(a_start, a_start, b_start, b_start + b_len));
        }
    }
}
