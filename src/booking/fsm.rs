//! The pure booking state machine (spec.md §4.7). Kept free of any I/O so
//! invariant 4 ("only transitions listed in §4.7 are observable") can be
//! property-tested directly against this function rather than a live
//! database.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    AwaitingDeposit,
    Confirmed,
    InProgress,
    Done,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Done | BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::AwaitingDeposit => "AWAITING_DEPOSIT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Done => "DONE",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// The actions that can drive a transition. `DepositPaid`/`DepositFailed`
/// arrive from the payment webhook (§4.7); the rest from admin/customer
/// endpoints or the scheduler's sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    DepositPaid,
    DepositFailed,
    Start,
    Complete,
    Cancel,
    Expire,
}

/// Apply `action` to `current`, returning the successor status or
/// `AppError::InvalidTransition` for anything not in the diagram in
/// spec.md §4.7. No transition here ever mutates anything — the caller
/// persists the result.
pub fn transition(current: BookingStatus, action: Action) -> Result<BookingStatus, AppError> {
    use Action::*;
    use BookingStatus::*;

    let next = match (current, action) {
        (AwaitingDeposit, DepositPaid) => Confirmed,
        (AwaitingDeposit, DepositFailed) => Expired,
        (AwaitingDeposit, Cancel) => Cancelled,
        (AwaitingDeposit, Expire) => Expired,
        (Pending, Expire) => Expired,
        (Confirmed, Start) => InProgress,
        (Confirmed, Cancel) => Cancelled,
        (InProgress, Complete) => Done,
        _ => {
            return Err(AppError::InvalidTransition {
                from: current.to_string(),
                action: format!("{action:?}"),
            })
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATUSES: &[BookingStatus] = &[
        BookingStatus::Pending,
        BookingStatus::AwaitingDeposit,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Done,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
    ];
    const ALL_ACTIONS: &[Action] =
        &[Action::DepositPaid, Action::DepositFailed, Action::Start, Action::Complete, Action::Cancel, Action::Expire];

    #[test]
    fn deposit_paid_confirms_awaiting_deposit() {
        assert_eq!(transition(BookingStatus::AwaitingDeposit, Action::DepositPaid).unwrap(), BookingStatus::Confirmed);
    }

    #[test]
    fn full_happy_path_chain() {
        let s = BookingStatus::AwaitingDeposit;
        let s = transition(s, Action::DepositPaid).unwrap();
        let s = transition(s, Action::Start).unwrap();
        let s = transition(s, Action::Complete).unwrap();
        assert_eq!(s, BookingStatus::Done);
    }

    #[test]
    fn terminal_states_reject_every_action() {
        for terminal in [BookingStatus::Done, BookingStatus::Cancelled, BookingStatus::Expired] {
            for action in ALL_ACTIONS {
                assert!(transition(terminal, *action).is_err());
            }
        }
    }

    #[test]
    fn confirmed_cannot_be_deposit_paid_again() {
        assert!(transition(BookingStatus::Confirmed, Action::DepositPaid).is_err());
    }

    proptest! {
        /// Invariant 4: a transition either lands on the one legal successor
        /// or is rejected outright — it can never silently no-op into an
        /// unlisted state.
        #[test]
        fn transition_is_never_a_noop_on_success(
            s_idx in 0..ALL_STATUSES.len(),
            a_idx in 0..ALL_ACTIONS.len(),
        ) {
            let status = ALL_STATUSES[s_idx];
            let action = ALL_ACTIONS[a_idx];
            if let Ok(next) = transition(status, action) {
                prop_assert_ne!(next, status);
            }
        }
    }
}
