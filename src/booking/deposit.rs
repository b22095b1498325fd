//! The deposit policy: a pure predicate of the booking context (spec.md
//! §4.7). Its output is stored on the booking row at creation time, never
//! recomputed, so a later policy change can never retroactively alter an
//! existing booking.

use chrono::{DateTime, Datelike, Utc, Weekday};

pub struct BookingContext {
    pub starts_at: DateTime<Utc>,
    pub duration_min: i32,
    pub is_new_client: bool,
}

/// Weekend, a deep-clean-length job (>= 4 hours), or a new client — any one
/// of these requires a deposit.
pub fn requires_deposit(ctx: &BookingContext) -> bool {
    is_weekend(ctx.starts_at) || is_deep_clean(ctx.duration_min) || ctx.is_new_client
}

fn is_weekend(at: DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_deep_clean(duration_min: i32) -> bool {
    duration_min >= 240
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx(starts_at: DateTime<Utc>, duration_min: i32, is_new_client: bool) -> BookingContext {
        BookingContext { starts_at, duration_min, is_new_client }
    }

    #[test]
    fn weekend_booking_requires_deposit() {
        // 2025-06-14 is a Saturday.
        let saturday = Utc.with_ymd_and_hms(2025, 6, 14, 15, 0, 0).unwrap();
        assert!(requires_deposit(&ctx(saturday, 120, false)));
    }

    #[test]
    fn short_weekday_returning_client_skips_deposit() {
        // 2025-06-12 is a Thursday.
        let thursday = Utc.with_ymd_and_hms(2025, 6, 12, 10, 0, 0).unwrap();
        assert!(!requires_deposit(&ctx(thursday, 90, false)));
    }

    #[test]
    fn deep_clean_requires_deposit_even_on_a_weekday() {
        let thursday = Utc.with_ymd_and_hms(2025, 6, 12, 10, 0, 0).unwrap();
        assert!(requires_deposit(&ctx(thursday, 240, false)));
    }

    #[test]
    fn new_client_requires_deposit_even_for_a_short_weekday_job() {
        let thursday = Utc.with_ymd_and_hms(2025, 6, 12, 10, 0, 0).unwrap();
        assert!(requires_deposit(&ctx(thursday, 90, true)));
    }
}
